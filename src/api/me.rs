use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{
	api::non_blank,
	auth::ApiSession,
	config::RessourcesRef,
	database::{
		Identity,
		models::{Profile, ProfileChangeset, Role},
	},
	error::{RouteError, RouteResult},
};

#[derive(Debug, Serialize)]
pub struct MeResponse {
	#[serde(flatten)]
	identity: Identity,
	role: Role,
	profile: Option<Profile>,
}

impl MeResponse {
	fn new(identity: Identity, profile: Option<Profile>) -> Self {
		Self {
			role: profile.as_ref().map_or_else(Role::default, Profile::role),
			identity,
			profile,
		}
	}
}

pub async fn me_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
) -> RouteResult<Json<MeResponse>> {
	let identity = auth.identity()?.clone();

	let user_id = identity.user_id;
	let profile = ressources
		.with_conn(move |conn| Ok(Profile::find(user_id, conn)?))
		.await?;

	Ok(Json(MeResponse::new(identity, profile)))
}

/// Roles are assigned out of band and cannot be changed here
#[derive(Debug, Deserialize)]
pub struct ProfilePayload {
	display_name: Option<String>,
	language: Option<String>,
	theme: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
	non_blank(value.as_deref()).map(str::to_owned)
}

impl ProfilePayload {
	/// Blank fields are dropped, `None` when nothing is left to write
	fn normalized(self) -> Option<Self> {
		let payload = Self {
			display_name: trimmed(self.display_name),
			language: trimmed(self.language),
			theme: trimmed(self.theme),
		};
		let empty =
			payload.display_name.is_none() && payload.language.is_none() && payload.theme.is_none();
		(!empty).then_some(payload)
	}
}

pub async fn me_put_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Json(payload): Json<ProfilePayload>,
) -> RouteResult<Json<MeResponse>> {
	let identity = auth.identity()?.clone();

	let Some(payload) = payload.normalized() else {
		return Err(RouteError::validation("nothing to update"));
	};

	let user_id = identity.user_id;
	let profile = ressources
		.with_conn(move |conn| {
			let changes = ProfileChangeset {
				display_name: payload.display_name.as_deref(),
				language: payload.language.as_deref(),
				theme: payload.theme.as_deref(),
			};
			Ok(Profile::upsert(user_id, &changes, conn)?)
		})
		.await?;

	Ok(Json(MeResponse::new(identity, Some(profile))))
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use time::OffsetDateTime;
	use uuid::Uuid;

	use super::*;
	use crate::database::models::UserId;

	fn identity() -> Identity {
		Identity {
			user_id: UserId(Uuid::nil()),
			email: Some("desk@edens.news".into()),
		}
	}

	#[test]
	fn callers_without_profile_are_readers() {
		let json = serde_json::to_value(MeResponse::new(identity(), None)).unwrap();

		assert_eq!(
			json,
			json!({
				"user_id": "00000000-0000-0000-0000-000000000000",
				"email": "desk@edens.news",
				"role": "reader",
				"profile": null,
			})
		);
	}

	#[test]
	fn the_profile_role_is_reported() {
		let profile = Profile {
			user_id: UserId(Uuid::nil()),
			display_name: Some("Desk".into()),
			role: "editor".into(),
			language: "en".into(),
			theme: "dark".into(),
			created_at: OffsetDateTime::UNIX_EPOCH,
		};

		let response = MeResponse::new(identity(), Some(profile));
		assert_eq!(response.role, Role::Editor);
	}

	#[test]
	fn blank_only_updates_are_rejected() {
		for body in ["{}", r#"{"theme":" "}"#, r#"{"display_name":"","language":"\t"}"#] {
			let payload: ProfilePayload = serde_json::from_str(body).unwrap();
			assert!(payload.normalized().is_none(), "{body}");
		}
	}

	#[test]
	fn updates_are_trimmed() {
		let payload: ProfilePayload =
			serde_json::from_str(r#"{"display_name":" Desk ","theme":"  "}"#).unwrap();
		let payload = payload.normalized().unwrap();

		assert_eq!(payload.display_name.as_deref(), Some("Desk"));
		assert_eq!(payload.language, None);
		assert_eq!(payload.theme, None);
	}
}
