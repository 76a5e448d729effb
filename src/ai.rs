//! Relays content generation requests to the AI provider.
//!
//! The provider key stays on the server, callers only choose the model, the
//! API version and the request body.

use axum::{
	Json,
	http::{HeaderValue, Method, StatusCode, header},
	response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{GEMINI_API_KEY_VAR, RessourcesRef};

const DEFAULT_API_VERSION: &str = "v1";

#[derive(Debug, thiserror::Error)]
enum AiError {
	#[error("method not allowed")]
	MethodNotAllowed,

	#[error("server is missing {GEMINI_API_KEY_VAR}")]
	MissingSecret,

	#[error("{0}")]
	BadRequest(String),

	#[error("could not reach the AI provider: {0}")]
	Transport(#[from] reqwest::Error),
}

impl IntoResponse for AiError {
	fn into_response(self) -> Response {
		let status = match &self {
			Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
			Self::BadRequest(_) => StatusCode::BAD_REQUEST,
			Self::MissingSecret => {
				tracing::error!("refusing AI request, {GEMINI_API_KEY_VAR} is not set");
				StatusCode::INTERNAL_SERVER_ERROR
			}
			Self::Transport(err) => {
				tracing::warn!(err = %err, "AI provider request failed");
				StatusCode::INTERNAL_SERVER_ERROR
			}
		};

		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
	model: Option<String>,
	api_version: Option<String>,
	body: Option<Value>,
}

/// Validated pieces of a generation call
#[derive(Debug)]
struct Generation {
	model: String,
	api_version: String,
	body: Value,
}

/// Both values end up in the provider URL path
fn is_path_safe(value: &str) -> bool {
	value
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl GenerateRequest {
	fn parse(payload: &[u8]) -> Result<Generation, AiError> {
		let request = serde_json::from_slice::<Self>(payload)
			.map_err(|err| AiError::BadRequest(format!("invalid request body: {err}")))?;

		let Some(model) = request.model.filter(|model| !model.trim().is_empty()) else {
			return Err(AiError::BadRequest("missing `model`".into()));
		};
		let Some(body) = request.body else {
			return Err(AiError::BadRequest("missing `body`".into()));
		};
		let api_version = request
			.api_version
			.filter(|version| !version.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_API_VERSION.into());

		if !is_path_safe(&model) || !is_path_safe(&api_version) {
			return Err(AiError::BadRequest(
				"`model` and `apiVersion` may only contain letters, digits, `.`, `_` and `-`".into(),
			));
		}

		Ok(Generation {
			model,
			api_version,
			body,
		})
	}
}

/// Browsers call the relay cross-origin, preflights are answered here
pub fn cors_layer() -> CorsLayer {
	CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::POST, Method::OPTIONS])
		.allow_headers([header::CONTENT_TYPE])
}

pub async fn gemini_handler(ressources: RessourcesRef, method: Method, payload: Bytes) -> Response {
	if method != Method::POST {
		return AiError::MethodNotAllowed.into_response();
	}

	generate(&ressources, &payload)
		.await
		.unwrap_or_else(IntoResponse::into_response)
}

async fn generate(ressources: &RessourcesRef, payload: &[u8]) -> Result<Response, AiError> {
	let secret = ressources
		.ai_api_key
		.as_deref()
		.ok_or(AiError::MissingSecret)?;
	let generation = GenerateRequest::parse(payload)?;

	let url = format!(
		"{}/{}/models/{}:generateContent",
		ressources.ai.endpoint.trim_end_matches('/'),
		generation.api_version,
		generation.model,
	);
	tracing::debug!(%url, model = %generation.model, "relaying generation request");

	let response = ressources
		.http_client
		.post(url)
		.query(&[("key", secret)])
		.json(&generation.body)
		.send()
		.await
		// the url carries the key
		.map_err(reqwest::Error::without_url)?;

	let status = response.status();
	let text = response.text().await.map_err(reqwest::Error::without_url)?;

	Ok((
		status,
		[(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
		text,
	)
		.into_response())
}
