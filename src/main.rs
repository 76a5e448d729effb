use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::app::App;
use crate::config::{Config, Ressources};

mod ai;
mod api;
mod app;
mod auth;
mod cache;
mod client;
mod config;
mod database;
mod error;
mod og;
mod proxy;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
	let config = Config::load_file_from_env().wrap_err("could not load the config")?;
	setup_tracing();

	let ressources = Ressources::init(&config).wrap_err("could not init ressources")?;

	App::new(config, ressources).serve().await
}

fn setup_tracing() {
	Registry::default()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info,edens_server=debug".into()),
		)
		.with(
			tracing_subscriber::fmt::layer()
				.with_file(true)
				.with_line_number(true),
		)
		.init();
}
