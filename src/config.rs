use std::{
	env::var,
	ops,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use axum::extract::FromRequestParts;
use eyre::WrapErr;
use serde::Deserialize;
use url::Url;

use crate::{
	cache::ResponseCache,
	client::ApiClient,
	database::{self, PoolConnection, PooledConnection},
	error::{RouteError, RouteResult},
};

/// Environment variable holding the AI provider secret
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize)]
pub struct Config {
	pub server: ServerConfig,
	#[serde(default)]
	pub pool: PoolConfig,
	#[serde(default)]
	pub cache: CacheConfig,
	pub proxy: ProxyConfig,
	pub og: OgConfig,
	#[serde(default)]
	pub ai: AiConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
	pub port: u16,
	pub database_url: String,
	/// Large enough for articles carrying several inline images
	#[serde(default = "default_body_limit")]
	pub body_limit: usize,
	#[serde(default = "default_static_dir")]
	pub static_dir: PathBuf,
}

const fn default_body_limit() -> usize {
	100 * 1024 * 1024
}

fn default_static_dir() -> PathBuf {
	"dist".into()
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
	pub max_size: u32,
	pub idle_timeout_secs: u64,
	pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			max_size: 20,
			idle_timeout_secs: 30,
			connection_timeout_secs: 2,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
	pub ttl_secs: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self { ttl_secs: 300 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
	/// Host every proxied path is appended to, without a trailing slash
	pub upstream: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OgConfig {
	#[serde(default = "default_page_path")]
	pub page_path: String,
	pub api_base_url: Url,
	pub site_url: String,
	pub site_name: String,
	pub default_title: String,
	pub default_description: String,
	pub default_image: String,
}

fn default_page_path() -> String {
	"/article".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
	pub endpoint: String,
}

impl Default for AiConfig {
	fn default() -> Self {
		Self {
			endpoint: "https://generativelanguage.googleapis.com".into(),
		}
	}
}

impl Config {
	pub fn load_file_from_env() -> eyre::Result<Self> {
		let config_path = var("EDENS_SERVER_CONFIG").unwrap_or_else(|_| "./config.toml".into());

		let config_path = AsRef::<Path>::as_ref(&config_path)
			.canonicalize()
			.wrap_err("could not find the config file")?;

		let config_content =
			std::fs::read_to_string(config_path).wrap_err("could not read the config file")?;
		let config = toml::from_str::<Self>(&config_content)
			.wrap_err("config file does not match the expect structure")?;

		Ok(config)
	}
}

#[derive(Debug)]
pub struct Ressources {
	pub database_handle: PoolConnection,
	pub cache: ResponseCache,
	pub cache_ttl: Duration,

	pub http_client: reqwest::Client,
	pub api_client: ApiClient,

	pub proxy: ProxyConfig,
	pub og: OgConfig,
	pub index_file: PathBuf,

	pub ai: AiConfig,
	pub ai_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RessourcesRef(pub(crate) Arc<Ressources>);

impl ops::Deref for RessourcesRef {
	type Target = Ressources;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl FromRequestParts<Self> for RessourcesRef {
	type Rejection = ();
	async fn from_request_parts(
		_parts: &mut axum::http::request::Parts,
		state: &Self,
	) -> Result<Self, Self::Rejection> {
		Ok(state.clone())
	}
}

impl Ressources {
	pub fn init(config: &Config) -> eyre::Result<RessourcesRef> {
		let db_pool = database::build_pool(&config.server.database_url, &config.pool)?;

		let mut conn = db_pool
			.get()
			.wrap_err("could not obtain a connection to run migrations")?;
		database::run_migrations(&mut conn)?;

		let ai_api_key = var(GEMINI_API_KEY_VAR).ok().filter(|key| !key.is_empty());
		if ai_api_key.is_none() {
			tracing::warn!("{GEMINI_API_KEY_VAR} is not set, AI requests will be refused");
		}

		let ressources = Self::assemble(config, db_pool, ai_api_key)?;
		Ok(RessourcesRef(Arc::new(ressources)))
	}

	pub(crate) fn assemble(
		config: &Config,
		database_handle: PoolConnection,
		ai_api_key: Option<String>,
	) -> eyre::Result<Self> {
		let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
		let http_client = reqwest::Client::builder()
			.user_agent(user_agent)
			.build()
			.wrap_err("could not build client")?;

		Ok(Self {
			database_handle,
			cache: ResponseCache::default(),
			cache_ttl: Duration::from_secs(config.cache.ttl_secs),
			api_client: ApiClient::with_client(http_client.clone(), config.og.api_base_url.clone()),
			http_client,
			proxy: config.proxy.clone(),
			og: config.og.clone(),
			index_file: config.server.static_dir.join("index.html"),
			ai: config.ai.clone(),
			ai_api_key,
		})
	}

	/// Runs blocking diesel work off the async executor
	pub async fn with_conn<T, F>(&self, op: F) -> RouteResult<T>
	where
		F: FnOnce(&mut PooledConnection) -> RouteResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let pool = self.database_handle.clone();
		tokio::task::spawn_blocking(move || {
			let mut conn = pool.get()?;
			op(&mut conn)
		})
		.await
		.map_err(|err| RouteError::Internal(eyre::Report::new(err)))?
	}
}
