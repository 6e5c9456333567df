#![cfg_attr(not(feature = "http-server"), allow(dead_code))]

mod config;
mod handlers;
mod models;
mod services;
#[cfg(feature = "http-server")]
mod server;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

use config::AppConfig;
use handlers::{CustomerProcessor, FoodProcessor};
use services::{Database, HttpPhotoSource, MlClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before the logger so RUST_LOG from the file applies
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting food nutrition tracker...");

    let config = AppConfig::from_env()?;

    let db = Arc::new(
        Database::new(&config.database_url, config.db_max_connections, config.history_days).await?,
    );
    log::info!("✅ PostgreSQL database initialized");

    let classifier = Arc::new(MlClient::new(
        config.ml_api_url.clone(),
        Duration::from_secs(config.ml_timeout_secs),
    )?);
    log::info!("✅ ML client initialized: {}", config.ml_api_url);

    let food_processor = Arc::new(FoodProcessor::new(classifier, db.clone()));
    let customer_processor = Arc::new(CustomerProcessor::new(db.clone(), Arc::new(HttpPhotoSource::new())));
    log::info!("✅ Processors initialized");

    #[cfg(feature = "http-server")]
    {
        let app = server::create_router(food_processor, customer_processor);
        let listener = tokio::net::TcpListener::bind(config.server_addr.as_str()).await?;
        log::info!("🌐 HTTP server listening on {}", config.server_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("❌ Failed to listen for shutdown signal: {}", e);
                }
            })
            .await?;
    }

    #[cfg(not(feature = "http-server"))]
    {
        let _ = (food_processor, customer_processor);
        log::warn!("⚠️ Built without http-server; nothing to serve");
        tokio::signal::ctrl_c().await?;
    }

    log::info!("🛑 Shutting down...");
    Ok(())
}
