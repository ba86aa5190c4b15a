use anyhow::Context;
use dotenvy::dotenv;
use log::info;

use intraserver::core::config::AppConfig;
use intraserver::main_module::{
    create_app_state, init_database, init_logging, run_axum_server, start_background_services,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let config = AppConfig::load(None).context("failed to load configuration")?;
    info!(
        "Starting intraserver {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address()
    );

    let pool = init_database(&config).context("database initialisation failed")?;
    let app_state = create_app_state(config, pool);

    let worker = start_background_services(app_state.clone());
    run_axum_server(app_state).await.context("HTTP server failed")?;

    if let Some(handle) = worker {
        handle.abort();
    }
    info!("intraserver stopped");
    Ok(())
}
