use std::time::Duration;

use diesel::{PgConnection, r2d2};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use eyre::{WrapErr, eyre};

use crate::config::PoolConfig;

#[rustfmt::skip]
pub mod schema;
pub mod models;

mod accounts;
mod articles;
mod categories;
mod engagement;

pub use self::accounts::Identity;
pub use self::articles::ArticleFilter;
pub use self::engagement::{ReactionCount, Toggled, ViewCount};

pub type PoolConnection = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;
pub type PooledConnection = r2d2::PooledConnection<r2d2::ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Waiting callers queue inside r2d2 until `connection_timeout` elapses
pub fn build_pool(database_url: &str, config: &PoolConfig) -> eyre::Result<PoolConnection> {
	let manager = r2d2::ConnectionManager::<PgConnection>::new(database_url);
	r2d2::Pool::builder()
		.max_size(config.max_size)
		.idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
		.connection_timeout(Duration::from_secs(config.connection_timeout_secs))
		.build(manager)
		.wrap_err("could not build database connection pool")
}

pub fn run_migrations(conn: &mut PooledConnection) -> eyre::Result<()> {
	let applied = conn
		.run_pending_migrations(MIGRATIONS)
		.map_err(|err| eyre!(err))
		.wrap_err("could not run pending migrations")?;

	for version in applied {
		tracing::info!(%version, "applied migration");
	}

	Ok(())
}
