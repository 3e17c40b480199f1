use std::sync::Arc;

use axum::extract::FromRef;

mod app;
mod auth;
mod books;
mod cart;
mod clock;
mod config;
mod db;
mod envelope;
mod error;
mod mailer;
mod orders;
mod state;
#[cfg(test)]
mod testing;

use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config).await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "migrations failed; continuing with the existing schema");
    }

    let state = AppState::from_pool(config.clone(), pool)?;

    if let Some(seed) = &config.seed_admin {
        if let Err(e) = AuthService::from_ref(&state).ensure_seed_admin(seed).await {
            tracing::error!(error = %e, "could not create seed admin");
        }
    }

    app::serve(&config, app::build_app(state)).await
}

/// `RUST_LOG` picks the filter, `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bookstore=debug,axum=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).init();
    }
}
