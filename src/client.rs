//! Thin JSON client over the public API.
//!
//! One attempt per call: no retries, no timeout besides the one of the
//! underlying `reqwest::Client`, and only the message of a failure is kept.

use reqwest::{
	Client, Method, StatusCode,
	header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone)]
pub struct ApiClient {
	client: Client,
	base_url: Url,
}

#[derive(Debug, Default)]
pub struct RequestOptions {
	pub method: Method,
	pub body: Option<Value>,
	pub headers: HeaderMap,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("{message}")]
	Api { status: StatusCode, message: String },

	#[error("transport: {0}")]
	Transport(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
	error: Option<String>,
}

impl ApiClient {
	pub const fn with_client(client: Client, base_url: Url) -> Self {
		Self { client, base_url }
	}

	pub fn url(&self, endpoint: &str) -> String {
		format!(
			"{}/{}",
			self.base_url.as_str().trim_end_matches('/'),
			endpoint.trim_start_matches('/')
		)
	}

	pub async fn request<T: DeserializeOwned>(
		&self,
		endpoint: &str,
		options: RequestOptions,
	) -> Result<T, ClientError> {
		let RequestOptions {
			method,
			body,
			headers,
		} = options;

		let mut request = self
			.client
			.request(method, self.url(endpoint))
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.headers(headers);
		if let Some(body) = &body {
			request = request.json(body);
		}

		let response = request.send().await?;
		let status = response.status();
		if !status.is_success() {
			let message = response
				.json::<ErrorBody>()
				.await
				.ok()
				.and_then(|body| body.error)
				.unwrap_or_else(|| format!("request failed with status {status}"));
			return Err(ClientError::Api { status, message });
		}

		Ok(response.json().await?)
	}

	pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ClientError> {
		self.request(endpoint, RequestOptions::default()).await
	}
}
