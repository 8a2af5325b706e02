//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Recommender service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecommenderConfig {
    /// Address the HTTP API binds to
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Base URL of the cloud-info catalogue service
    #[serde(default = "default_cloud_info_address")]
    pub cloud_info_address: String,

    /// Cadence of the long-lived product info renewal in seconds; spot
    /// prices renew every minute with a two-minute TTL regardless
    #[serde(default = "default_renewal_interval")]
    pub product_info_renewal_interval_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS settings for the HTTP API
    #[serde(default)]
    pub cors: CorsConfig,
}

/// CORS settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_listen_address() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_cloud_info_address() -> String {
    "http://localhost:8000".to_string()
}

fn default_renewal_interval() -> u64 {
    24 * 60 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RecommenderConfig {
    /// Load configuration from an optional `recommender` config file and
    /// `RECOMMENDER_*` environment variables.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("recommender").required(false))
            .add_source(config::Environment::with_prefix("RECOMMENDER").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
