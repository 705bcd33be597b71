use quietline::{config::Config, db, telemetry, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init()?;

    let config = Config::from_env()?;

    let db_pool = db::connect(&config).await?;
    db::migrate(&db_pool).await?;

    let app = quietline::app(AppState::new(db_pool), &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, version = env!("CARGO_PKG_VERSION"), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
