use std::{
	pin::Pin,
	task::{Context, Poll},
};

use axum::{
	extract::FromRequestParts,
	http::{Request, header, request::Parts},
};
use eyre::{WrapErr, eyre};
use tokio::task;
use tower::{Layer, Service};

use crate::{
	config::Ressources,
	database::{Identity, PoolConnection, models::UserId},
	error::{AuthError, RouteError},
};

/// Caller identity resolved from the bearer token, if any
#[derive(Debug, Clone)]
pub struct ApiSession {
	pub identity: Option<Identity>,
}

impl ApiSession {
	pub fn identity(&self) -> Result<&Identity, AuthError> {
		self.identity.as_ref().ok_or(AuthError::NotAuthenticated)
	}

	pub fn user_id(&self) -> Result<UserId, AuthError> {
		self.identity().map(|identity| identity.user_id)
	}
}

impl<S: Send + Sync> FromRequestParts<S> for ApiSession {
	type Rejection = RouteError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let msg = "logic error: could not access `ApiSession` extension";
		parts
			.extensions
			.get::<Self>()
			.cloned()
			.ok_or_else(|| RouteError::Internal(eyre!(msg)))
	}
}

#[derive(Debug, Clone)]
pub struct ApiAuthnLayer {
	db_handle: PoolConnection,
}

impl ApiAuthnLayer {
	pub fn new(ressources: &Ressources) -> Self {
		Self {
			db_handle: ressources.database_handle.clone(),
		}
	}
}

impl<S> Layer<S> for ApiAuthnLayer {
	type Service = AuthnService<S>;

	fn layer(&self, service: S) -> Self::Service {
		AuthnService {
			service,
			db_handle: self.db_handle.clone(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AuthnService<S> {
	service: S,
	db_handle: PoolConnection,
}

impl<S> AuthnService<S> {
	fn extract_token<ReqBody>(req: &Request<ReqBody>) -> Option<String> {
		let authz_header = req.headers().get(header::AUTHORIZATION)?;
		let token = authz_header.to_str().ok()?.strip_prefix("Bearer ")?.trim();

		if token.is_empty() {
			return None;
		}

		Some(token.to_owned())
	}
}

/// Lookup failures degrade to an anonymous session
async fn resolve_identity(db_handle: PoolConnection, token: String) -> Option<Identity> {
	let lookup = task::spawn_blocking(move || {
		let mut conn = db_handle
			.get()
			.wrap_err("could not obtain a connection handle")?;
		Identity::from_token(&token, &mut conn).wrap_err("could not query auth tokens")
	});

	match lookup.await {
		Ok(Ok(identity)) => identity,
		Ok(Err(err)) => {
			tracing::warn!(err = %err, "could not resolve bearer token");
			None
		}
		Err(err) => {
			tracing::error!(err = %err, "token lookup task failed");
			None
		}
	}
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

impl<S, ReqBody> Service<Request<ReqBody>> for AuthnService<S>
where
	S: Service<Request<ReqBody>> + Clone + Send + 'static,
	S::Future: Send,
	ReqBody: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.service.poll_ready(cx)
	}

	fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
		let token = Self::extract_token(&req);
		let db_handle = self.db_handle.clone();

		// keep the instance that was driven to readiness
		let clone = self.service.clone();
		let mut service = std::mem::replace(&mut self.service, clone);

		Box::pin(async move {
			let identity = match token {
				Some(token) => resolve_identity(db_handle, token).await,
				None => None,
			};

			req.extensions_mut().insert(ApiSession { identity });
			service.call(req).await
		})
	}
}

#[cfg(test)]
mod tests {
	use axum::body::Body;
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(Some("Bearer abc123"), Some("abc123"))]
	#[case(Some("Bearer   "), None)]
	#[case(Some("Basic dXNlcjpwYXNz"), None)]
	#[case(None, None)]
	fn extracts_bearer_tokens(#[case] header_value: Option<&str>, #[case] expected: Option<&str>) {
		let mut builder = Request::builder().uri("/api/me");
		if let Some(value) = header_value {
			builder = builder.header(header::AUTHORIZATION, value);
		}
		let req = builder.body(Body::empty()).unwrap();

		assert_eq!(AuthnService::<()>::extract_token(&req).as_deref(), expected);
	}

	#[test]
	fn anonymous_sessions_are_rejected_where_identity_matters() {
		let session = ApiSession { identity: None };
		assert!(matches!(session.user_id(), Err(AuthError::NotAuthenticated)));
	}
}
