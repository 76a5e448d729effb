//! Forwards `/proxy?path=/x&...` to the same path on the upstream API host.

use axum::{
	Json,
	extract::RawQuery,
	http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
};
use bytes::Bytes;
use itertools::Itertools;
use serde_json::{Value, json};

use crate::config::RessourcesRef;

const PATH_PARAM: &str = "path";

#[derive(Debug, thiserror::Error)]
enum ProxyError {
	#[error("missing `path` query parameter")]
	MissingPath,

	#[error("`path` must start with `/`")]
	RelativePath,

	#[error("{0}")]
	Transport(#[from] reqwest::Error),

	#[error("upstream answered with invalid JSON: {0}")]
	Decode(#[from] serde_json::Error),
}

impl IntoResponse for ProxyError {
	fn into_response(self) -> Response {
		let status = match &self {
			Self::MissingPath | Self::RelativePath => StatusCode::BAD_REQUEST,
			Self::Transport(_) | Self::Decode(_) => {
				tracing::warn!(err = %self, "proxied request failed");
				StatusCode::INTERNAL_SERVER_ERROR
			}
		};

		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

/// Decoded value of the first `path` parameter
///
/// It is appended right after the upstream origin, so anything but an
/// absolute path could move the request to another host or port.
fn target_path(raw_query: &str) -> Result<String, ProxyError> {
	let path = url::form_urlencoded::parse(raw_query.as_bytes())
		.find(|(name, _)| name == PATH_PARAM)
		.map(|(_, value)| value.into_owned())
		.filter(|path| !path.is_empty())
		.ok_or(ProxyError::MissingPath)?;

	if !path.starts_with('/') {
		return Err(ProxyError::RelativePath);
	}
	Ok(path)
}

/// `upstream` + `path` + every other parameter of `raw_query`, untouched and in order
pub fn upstream_url(upstream: &str, path: &str, raw_query: &str) -> String {
	let forwarded = raw_query
		.split('&')
		.filter(|pair| !pair.is_empty())
		.filter(|pair| pair.split('=').next() != Some(PATH_PARAM))
		.join("&");

	let mut url = format!("{}{path}", upstream.trim_end_matches('/'));
	if !forwarded.is_empty() {
		url.push('?');
		url.push_str(&forwarded);
	}
	url
}

pub async fn proxy_handler(
	ressources: RessourcesRef,
	method: Method,
	RawQuery(raw_query): RawQuery,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	forward(&ressources, method, raw_query.as_deref().unwrap_or_default(), &headers, body)
		.await
		.unwrap_or_else(IntoResponse::into_response)
}

async fn forward(
	ressources: &RessourcesRef,
	method: Method,
	raw_query: &str,
	headers: &HeaderMap,
	body: Bytes,
) -> Result<Response, ProxyError> {
	let path = target_path(raw_query)?;
	let url = upstream_url(&ressources.proxy.upstream, &path, raw_query);

	let content_type = headers
		.get(CONTENT_TYPE)
		.cloned()
		.unwrap_or_else(|| HeaderValue::from_static("application/json"));

	tracing::debug!(%method, %url, "proxying request");
	let with_body = !matches!(method, Method::GET | Method::HEAD);
	let mut request = ressources
		.http_client
		.request(method, url)
		.header(CONTENT_TYPE, content_type);
	if with_body {
		request = request.body(body);
	}

	let response = request.send().await?;
	let status = response.status();
	let payload = response.bytes().await?;

	// HEAD and 204 answers have nothing to decode
	if payload.is_empty() {
		return Ok(status.into_response());
	}

	let payload = serde_json::from_slice::<Value>(&payload)?;
	Ok((status, Json(payload)).into_response())
}
