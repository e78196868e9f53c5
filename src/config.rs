use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

pub const DEFAULT_ML_MODEL_URL: &str = "https://thesisdelaypredictor.onrender.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub ml_model_url: String,
    pub ml_timeout: Duration,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_url: env::var("DATABASE_URL").ok(),
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            ml_model_url: try_load::<String>("ML_MODEL_URL", DEFAULT_ML_MODEL_URL)?
                .trim_end_matches('/')
                .to_string(),
            ml_timeout: Duration::from_secs(try_load("ML_TIMEOUT_SECS", "30")?),
            bcrypt_cost: try_load("BCRYPT_COST", "10")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("environment misconfigured: {key}={raw}: {e}")
    })
}
