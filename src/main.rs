use anyhow::{Context, Result};
use chrono::Duration;
use secrecy::ExposeSecret;
use shop_orderservice::{
    auth::token::TokenService,
    core::{
        app_state::AppState,
        bootstrap::{self, bootstrap},
        config, db,
    },
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load().context("Failed to load configuration")?;

    tracing::info!("Running migrations...");
    let migrations_count =
        db::run_migrations_blocking(db::MIGRATIONS, config.database.url.expose_secret()).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::connect(&config.database).await?;
    let token_ttl = Duration::try_seconds(config.auth.jwt_expiration_secs)
        .context("JWT_EXPIRATION_SECS is out of range")?;
    let tokens = TokenService::new(config.auth.jwt_secret.expose_secret().as_bytes(), token_ttl);
    let app = routes::app(AppState::from_pool(db_pool, tokens));

    tracing::info!("Bootstrapping...");
    bootstrap("ShopService", app, &config.server).await?;
    Ok(())
}
