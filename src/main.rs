use anyhow::Context;

mod accounts;
mod app;
mod auth;
mod config;
mod db;
mod error;
mod migrations;
mod state;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "accountd=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let db = db::connect(&config.database).await?;

    // Startup barrier: no request is served against a half-migrated schema.
    let outcome = migrations::run_account_migrations(&db)
        .await
        .context("database migration failed; refusing to start")?;
    tracing::info!(
        from = outcome.from,
        to = outcome.to,
        applied = outcome.applied(),
        "schema up to date"
    );

    let state = AppState::init(&config, db)?;
    let app = app::build_app(state);
    app::serve(&config, app).await
}
