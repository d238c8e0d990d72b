use anyhow::{Context, Result};
use diesel_async::{
    AsyncPgConnection,
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::{AsyncDieselConnectionManager, bb8::Pool},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use secrecy::ExposeSecret;

use super::{aliases::DbPool, config::DatabaseConfig};

/// Migrations embedded into the binary which helps with streamlining image building process
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Build the shared connection pool.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    let manager =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.expose_secret());

    Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Run pending migrations on a blocking thread and return how many were applied.
pub async fn run_migrations_blocking(
    migrations: EmbeddedMigrations,
    database_url: &str,
) -> Result<usize> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || -> Result<usize> {
        use diesel::Connection;

        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)
            .context("Failed to connect for migrations")?;

        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow::anyhow!(err))
            .context("Failed to run migrations")?;

        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
