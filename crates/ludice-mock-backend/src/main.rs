//! Ludicé Mock Backend Service
//!
//! Serves the game server API from memory for local development.

use ludice_mock_backend::{create_router, BackendConfig, BackendState};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn config_from_env() -> BackendConfig {
    let defaults = BackendConfig::default();
    BackendConfig {
        secret_key: std::env::var("LUDICE_SECRET_KEY").unwrap_or(defaults.secret_key),
        rate_limit: Duration::from_millis(env_or(
            "LUDICE_RATE_LIMIT_MS",
            defaults.rate_limit.as_millis() as u64,
        )),
        default_balance: env_or("LUDICE_INITIAL_BALANCE", defaults.default_balance),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config_from_env();
    let port: u16 = env_or("PORT", 8080);

    info!(
        "Rate limit {:?}, starting balance {}",
        config.rate_limit, config.default_balance
    );
    let state = Arc::new(BackendState::new(config)?);
    let app = create_router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Mock backend listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    if let Err(e) = run().await {
        error!("Mock backend failed: {}", e);
        std::process::exit(1);
    }
}
