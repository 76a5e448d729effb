use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	sync::Arc,
};

use axum::{
	Router,
	extract::DefaultBodyLimit,
	http::{HeaderName, header},
	routing::{any, get},
};
use eyre::WrapErr;
use tokio::{net::TcpListener, signal};
use tower_http::{
	limit::RequestBodyLimitLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	sensitive_headers::{SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer},
	services::{ServeDir, ServeFile},
	trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
	api,
	config::{Config, RessourcesRef},
	og, proxy,
};

pub struct App {
	config: Config,
	ressources: RessourcesRef,
}

impl App {
	pub const fn new(config: Config, ressources: RessourcesRef) -> Self {
		Self { config, ressources }
	}
}

impl App {
	/// Every route of the server, without the outer layers
	fn routes(&self) -> Router<RessourcesRef> {
		let static_dir = &self.config.server.static_dir;
		let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

		Router::new()
			.route("/health", get(api::health_handler))
			.route("/proxy", any(proxy::proxy_handler))
			.route(&self.ressources.og.page_path, get(og::og_page_handler))
			.nest("/api", api::router(&self.ressources))
			.fallback_service(spa)
	}

	/// Routes wrapped in request ids, tracing and the body limit
	fn router(&self) -> Router<RessourcesRef> {
		let x_request_id = HeaderName::from_static("x-request-id");
		let headers: Arc<[_]> =
			Arc::new([header::AUTHORIZATION, header::COOKIE, header::SET_COOKIE]);

		self.routes()
			.layer(PropagateRequestIdLayer::new(x_request_id.clone()))
			.layer(SetSensitiveResponseHeadersLayer::from_shared(
				headers.clone(),
			))
			.layer(
				TraceLayer::new_for_http()
					.make_span_with(DefaultMakeSpan::new().include_headers(true))
					.on_response(DefaultOnResponse::new().include_headers(true)),
			)
			.layer(SetSensitiveRequestHeadersLayer::from_shared(headers))
			.layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
			// the configured limit replaces axum's 2MB default
			.layer(DefaultBodyLimit::disable())
			.layer(RequestBodyLimitLayer::new(self.config.server.body_limit))
	}

	pub async fn serve(self) -> eyre::Result<()> {
		let layered_app = self.router().with_state(self.ressources);

		let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.config.server.port);
		let listener = TcpListener::bind(addr)
			.await
			.wrap_err_with(|| format!("could not bind to the specified interface: {addr:?}"))?;

		tracing::info!(%addr, "starting app router");
		axum::serve(
			listener,
			layered_app.into_make_service_with_connect_info::<SocketAddr>(),
		)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.wrap_err("could not serve app")?;

		tracing::info!("server stopped");

		Ok(())
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
		() = terminate => tracing::info!("received SIGTERM, shutting down"),
	}
}

#[cfg(test)]
mod tests {
	use axum::{
		body::{Body, to_bytes},
		http::{Request, StatusCode},
	};
	use serde_json::Value;
	use tower::ServiceExt;

	use super::*;
	use crate::testing;

	const INDEX: &str = "<html><head></head><body>spa</body></html>";

	fn app_with(config: Config) -> Router {
		let ressources = testing::ressources(&config, None);
		App::new(config, ressources.clone())
			.router()
			.with_state(ressources)
	}

	fn app(static_dir: &std::path::Path) -> Router {
		let mut config = testing::config();
		config.server.static_dir = static_dir.to_path_buf();
		app_with(config)
	}

	async fn body_text(response: axum::response::Response) -> String {
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		String::from_utf8(body.to_vec()).unwrap()
	}

	#[tokio::test]
	async fn health_is_served_at_the_root() {
		let static_dir = tempfile::tempdir().unwrap();
		let request = Request::get("/health").body(Body::empty()).unwrap();
		let response = app(static_dir.path()).oneshot(request).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
		assert_eq!(body["status"], "ok");
	}

	#[tokio::test]
	async fn unknown_paths_fall_back_to_the_spa() {
		let static_dir = tempfile::tempdir().unwrap();
		std::fs::write(static_dir.path().join("index.html"), INDEX).unwrap();
		std::fs::write(static_dir.path().join("robots.txt"), "User-agent: *").unwrap();

		let request = Request::get("/robots.txt").body(Body::empty()).unwrap();
		let response = app(static_dir.path()).oneshot(request).await.unwrap();
		assert_eq!(body_text(response).await, "User-agent: *");

		let request = Request::get("/category/sport").body(Body::empty()).unwrap();
		let response = app(static_dir.path()).oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_text(response).await, INDEX);
	}

	#[tokio::test]
	async fn article_page_is_served_as_html() {
		let static_dir = tempfile::tempdir().unwrap();
		std::fs::write(static_dir.path().join("index.html"), INDEX).unwrap();

		let request = Request::get("/article").body(Body::empty()).unwrap();
		let response = app(static_dir.path()).oneshot(request).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		assert!(
			response.headers()[header::CONTENT_TYPE]
				.to_str()
				.unwrap()
				.starts_with("text/html")
		);
		assert_eq!(body_text(response).await, INDEX);
	}

	#[tokio::test]
	async fn article_page_ignores_repeated_ids() {
		let static_dir = tempfile::tempdir().unwrap();
		std::fs::write(static_dir.path().join("index.html"), INDEX).unwrap();

		let request = Request::get("/article?id=a&id=b").body(Body::empty()).unwrap();
		let response = app(static_dir.path()).oneshot(request).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_text(response).await, INDEX);
	}

	#[tokio::test]
	async fn bodies_over_the_limit_are_refused() {
		let mut config = testing::config();
		config.server.body_limit = 16;

		let request = Request::post("/proxy?path=/articles")
			.header(header::CONTENT_TYPE, "application/json")
			.header(header::CONTENT_LENGTH, "64")
			.body(Body::from("x".repeat(64)))
			.unwrap();
		let response = app_with(config).oneshot(request).await.unwrap();

		assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[tokio::test]
	async fn responses_carry_a_request_id() {
		let static_dir = tempfile::tempdir().unwrap();
		let request = Request::get("/health").body(Body::empty()).unwrap();
		let response = app(static_dir.path()).oneshot(request).await.unwrap();

		assert!(response.headers().contains_key("x-request-id"));
	}
}
