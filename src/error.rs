use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use diesel::{
	r2d2::PoolError,
	result::{DatabaseErrorKind, Error as DieselError},
};
use serde_json::json;

pub type RouteResult<T> = Result<T, RouteError>;

/// Every failure a route can report, each kind owning one status code
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
	#[error("{0}")]
	NotFound(&'static str),

	#[error("{0}")]
	Conflict(&'static str),

	#[error("{0}")]
	Validation(String),

	#[error("upstream: {0}")]
	Upstream(String),

	#[error("internal: {0}")]
	Internal(#[from] eyre::Report),

	#[error("auth: {0}")]
	Auth(#[from] AuthError),
}

impl RouteError {
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}

	pub const fn status(&self) -> StatusCode {
		match self {
			Self::NotFound(_) => StatusCode::NOT_FOUND,
			Self::Conflict(_) => StatusCode::CONFLICT,
			Self::Validation(_) => StatusCode::BAD_REQUEST,
			Self::Upstream(_) => StatusCode::BAD_GATEWAY,
			Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Auth(err) => err.status(),
		}
	}
}

impl From<PoolError> for RouteError {
	fn from(value: PoolError) -> Self {
		Self::Internal(eyre::Report::new(value).wrap_err("could not obtain a connection handle"))
	}
}

impl From<DieselError> for RouteError {
	fn from(value: DieselError) -> Self {
		match value {
			DieselError::NotFound => Self::NotFound("resource not found"),
			DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
				Self::Conflict("resource already exists")
			}
			DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
				Self::validation("referenced resource does not exist")
			}
			DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
				Self::validation(info.message())
			}
			err => Self::Internal(eyre::Report::new(err)),
		}
	}
}

impl IntoResponse for RouteError {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = match &self {
			Self::Internal(err) => {
				tracing::error!(err = ?err, "error at route boundary");
				"internal server error".to_owned()
			}
			Self::Upstream(msg) => {
				tracing::warn!(err = %msg, "upstream error at route boundary");
				self.to_string()
			}
			_ => self.to_string(),
		};

		(status, Json(json!({ "error": message }))).into_response()
	}
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("user is not authenticated")]
	NotAuthenticated,

	#[error("user lacks the required role")]
	Forbidden,
}

impl AuthError {
	pub const fn status(&self) -> StatusCode {
		match self {
			Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
			Self::Forbidden => StatusCode::FORBIDDEN,
		}
	}
}
