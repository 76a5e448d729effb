use axum::{Json, Router, extract::Path, routing::get};
use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{
	api::{cached, require_role},
	auth::ApiSession,
	config::RessourcesRef,
	database::models::{Role, SettingsKind, SettingsRecord},
	error::{RouteError, RouteResult},
};

pub const CACHE_PREFIX: &str = "settings";

pub fn router() -> Router<RessourcesRef> {
	Router::new().route("/{kind}", get(settings_get_handler).put(settings_put_handler))
}

fn kind_cache_key(kind: SettingsKind) -> String {
	format!("{CACHE_PREFIX}/{}", kind.as_str())
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
	kind: SettingsKind,
	data: Value,
	#[serde(with = "time::serde::rfc3339::option")]
	updated_at: Option<OffsetDateTime>,
}

impl SettingsResponse {
	/// A kind that was never written reads as an empty object
	fn from_record(kind: SettingsKind, record: Option<SettingsRecord>) -> Self {
		match record {
			Some(record) => Self {
				kind,
				data: record.data,
				updated_at: Some(record.updated_at),
			},
			None => Self {
				kind,
				data: Value::Object(Map::new()),
				updated_at: None,
			},
		}
	}
}

async fn settings_get_handler(
	ressources: RessourcesRef,
	Path(kind): Path<SettingsKind>,
) -> RouteResult<Json<Value>> {
	cached(&ressources, kind_cache_key(kind), || async {
		let record = ressources
			.with_conn(move |conn| Ok(SettingsRecord::get(kind, conn)?))
			.await?;
		Ok(SettingsResponse::from_record(kind, record))
	})
	.await
}

// Replace the whole record of `kind`
async fn settings_put_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(kind): Path<SettingsKind>,
	Json(data): Json<Value>,
) -> RouteResult<Json<SettingsResponse>> {
	let identity = require_role(&ressources, &auth, Role::Editor).await?;

	if !data.is_object() {
		return Err(RouteError::validation("settings must be a JSON object"));
	}

	let record = ressources
		.with_conn(move |conn| Ok(SettingsRecord::replace(kind, data, conn)?))
		.await?;

	ressources.cache.invalidate_prefix(&kind_cache_key(kind));
	tracing::info!(kind = kind.as_str(), user_id = %identity.user_id.0, "settings replaced");

	Ok(Json(SettingsResponse::from_record(kind, Some(record))))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn unwritten_settings_read_as_empty() {
		let response = SettingsResponse::from_record(SettingsKind::Stream, None);
		let json = serde_json::to_value(&response).unwrap();

		assert_eq!(
			json,
			json!({ "kind": "stream", "data": {}, "updated_at": null })
		);
	}

	#[test]
	fn stored_records_are_returned_verbatim() {
		let updated_at = OffsetDateTime::UNIX_EPOCH;
		let record = SettingsRecord {
			kind: "site".into(),
			data: json!({ "site_name": "Edens News", "ticker": ["a", "b"] }),
			updated_at,
		};

		let json = serde_json::to_value(SettingsResponse::from_record(SettingsKind::Site, Some(record)))
			.unwrap();
		assert_eq!(json["data"]["ticker"], json!(["a", "b"]));
		assert_eq!(json["updated_at"], "1970-01-01T00:00:00Z");
	}

	#[test]
	fn each_kind_has_its_own_cache_entry() {
		assert_eq!(kind_cache_key(SettingsKind::Site), "settings/site");
		assert_eq!(kind_cache_key(SettingsKind::Stream), "settings/stream");
	}
}
