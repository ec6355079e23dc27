use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use photocal_tracker::config::Config;
use photocal_tracker::handlers::ScanHandler;
use photocal_tracker::server::create_scan_router;
use photocal_tracker::services::{GeminiService, OpenFoodFactsClient};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so RUST_LOG from it applies
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting PhotoCal Tracker API...");

    let config = Config::from_env()?;
    log::debug!("⚙️ Loaded configuration: {:?}", config);

    let gemini = Arc::new(GeminiService::with_api_base(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_api_base.clone(),
    ));
    log::info!("✅ Gemini service initialized with model: {}", gemini.model());

    let products = Arc::new(OpenFoodFactsClient::new(config.open_food_facts_url.clone()));
    log::info!("✅ Open Food Facts client initialized: {}", config.open_food_facts_url);

    let scan_handler = Arc::new(ScanHandler::new(gemini, products));
    let app = create_scan_router(scan_handler);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    log::info!("🌐 Scan API listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await
        .context("Scan API server failed")?;

    Ok(())
}
