use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub ml_api_url: String,
    pub ml_timeout_secs: u64,
    pub history_days: i64,
    pub server_addr: String,
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️ Invalid value for {}: '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            database_url,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 5),
            ml_api_url: env::var("ML_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
            ml_timeout_secs: parsed_or("ML_TIMEOUT_SECS", 30),
            history_days: parsed_or("NUTRITION_HISTORY_DAYS", 7),
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}
