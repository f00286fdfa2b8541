use tracing_subscriber::EnvFilter;

use flock_api::config;
use flock_api::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting Flock API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("SECURITY_JWT_SECRET (or JWT_SECRET) must be set outside development");
    }
    if flock_api::is_development!() && config.security.jwt_secret == config::DEVELOPMENT_JWT_SECRET {
        tracing::warn!("Using the built-in development JWT secret");
    }

    // Connect eagerly so migrations run before the first request
    if let Err(e) = DatabaseManager::pool().await {
        tracing::warn!("Database not available at startup: {}", e);
    }

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Flock API listening on http://{}", bind_addr);

    axum::serve(listener, flock_api::app())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    DatabaseManager::close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
