use anyhow::Context;
use reservation_engine::{create_pool, health_check, Config, ExpiryReaper, Metrics, SERVICE_NAME};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().context("failed to read configuration")?;

    info!("{} starting", SERVICE_NAME);

    let pool = create_pool(&config.database)
        .await
        .context("failed to connect to database")?;

    info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    health_check(&pool)
        .await
        .context("reservation schema unavailable")?;

    let metrics = Metrics::new().context("failed to register metrics")?;

    // The HTTP transport is wired by the surrounding application; this
    // binary owns the reaper lifecycle.
    let reaper = ExpiryReaper::new(pool.clone(), config.reaper.clone(), metrics).spawn();

    shutdown_signal()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    reaper.shutdown().await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
