use forum_service::{logging, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_tracing(&config.log);

    tracing::info!(
        env = %config.app.env,
        storage = ?config.storage.kind,
        "starting forum-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::build(config).await?;
    tracing::info!("forum-service ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    state.shutdown().await;
    tracing::info!("forum-service stopped");
    Ok(())
}
