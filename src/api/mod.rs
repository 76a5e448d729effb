use axum::{
	Json, Router,
	routing::{any, get},
};
use eyre::WrapErr;
use serde::Serialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
	ai,
	auth::{ApiAuthnLayer, ApiSession},
	config::{Ressources, RessourcesRef},
	database::{
		Identity,
		models::{Profile, Role, UserId},
	},
	error::{AuthError, RouteResult},
};

mod articles;
mod bookmarks;
mod categories;
mod engagement;
mod me;
mod settings;

pub fn router(ressources: &Ressources) -> Router<RessourcesRef> {
	let api_auth_layer = ApiAuthnLayer::new(ressources);

	Router::new()
		.nest("/articles", articles::router())
		.nest("/categories", categories::router())
		.nest("/bookmarks", bookmarks::router())
		.nest("/settings", settings::router())
		.nest("/analytics", engagement::analytics_router())
		.route("/me", get(me::me_get_handler).put(me::me_put_handler))
		.layer(api_auth_layer)
		// the AI proxy holds its own secret and stays anonymous
		.route("/gemini", any(ai::gemini_handler).layer(ai::cors_layer()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	status: &'static str,
	timestamp: String,
}

pub async fn health_handler() -> RouteResult<Json<HealthResponse>> {
	let timestamp = OffsetDateTime::now_utc()
		.format(&Rfc3339)
		.wrap_err("could not format current time")?;

	Ok(Json(HealthResponse {
		status: "ok",
		timestamp,
	}))
}

/// Profiles are optional, a missing one grants the reader role
async fn role_of(ressources: &RessourcesRef, user_id: UserId) -> RouteResult<Role> {
	let profile = ressources
		.with_conn(move |conn| Ok(Profile::find(user_id, conn)?))
		.await?;

	Ok(profile.as_ref().map_or_else(Role::default, Profile::role))
}

/// Anonymous callers read like readers, without a database round trip
async fn caller_role(ressources: &RessourcesRef, auth: &ApiSession) -> RouteResult<Role> {
	match &auth.identity {
		Some(identity) => role_of(ressources, identity.user_id).await,
		None => Ok(Role::default()),
	}
}

async fn require_role(
	ressources: &RessourcesRef,
	auth: &ApiSession,
	min_role: Role,
) -> RouteResult<Identity> {
	let identity = auth.identity()?.clone();

	let role = role_of(ressources, identity.user_id).await?;
	if role < min_role {
		tracing::debug!(user_id = %identity.user_id.0, ?role, ?min_role, "insufficient role");
		return Err(AuthError::Forbidden.into());
	}

	Ok(identity)
}

/// Serves `key` from the response cache, filling it with `load` on a miss
async fn cached<T, F, Fut>(
	ressources: &RessourcesRef,
	key: String,
	load: F,
) -> RouteResult<Json<Value>>
where
	T: Serialize,
	F: FnOnce() -> Fut,
	Fut: Future<Output = RouteResult<T>>,
{
	if let Some(payload) = ressources.cache.get(&key) {
		tracing::debug!(%key, "cache hit");
		return Ok(Json(payload));
	}

	let value = load().await?;
	let payload = serde_json::to_value(&value).wrap_err("could not serialize response")?;
	ressources
		.cache
		.insert(key.clone(), payload.clone(), ressources.cache_ttl);
	tracing::debug!(%key, entries = ressources.cache.len(), "cached response");

	Ok(Json(payload))
}

/// Rejects strings that are absent or only whitespace
fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
