//! Configuration module
//!
//! Env-driven configuration for the ingestion service, reconciliation engine,
//! and health reporter. `Config::from_env()` reads the environment (after the
//! binary has loaded `.env` via dotenvy) and `validate()` rejects unusable
//! combinations before anything is wired up.

use std::env;

use crate::constants;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Opaque bearer token callers must present. The authorization
    /// collaborator compares it in constant time.
    pub api_token: String,
    /// Root directory for the local object store backend.
    pub local_storage_path: String,
    pub max_file_size_bytes: usize,
    pub compression_threshold_bytes: usize,
    pub encode_quality: f32,
    pub encode_max_dimension: u32,
    /// Minimum object age before an apparent orphan is eligible for cleanup.
    pub grace_window_secs: i64,
    pub max_scan_items: usize,
    /// Skips live probes in the health reporter; checks report "not_checked".
    pub safe_mode: bool,
    pub max_memory_usage_percent: f64,
    pub environment: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let api_token =
            env::var("API_TOKEN").map_err(|_| anyhow::anyhow!("API_TOKEN must be set"))?;

        Ok(Self {
            server_port: env_parse("SERVER_PORT", 3000),
            database_url,
            api_token,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/tally/objects".to_string()),
            max_file_size_bytes: env_parse(
                "MAX_FILE_SIZE_BYTES",
                constants::DEFAULT_MAX_FILE_SIZE_BYTES,
            ),
            compression_threshold_bytes: env_parse(
                "COMPRESSION_THRESHOLD_BYTES",
                constants::DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            ),
            encode_quality: env_parse("ENCODE_QUALITY", constants::DEFAULT_ENCODE_QUALITY),
            encode_max_dimension: env_parse(
                "ENCODE_MAX_DIMENSION",
                constants::DEFAULT_MAX_DIMENSION,
            ),
            grace_window_secs: env_parse(
                "GRACE_WINDOW_SECS",
                constants::DEFAULT_GRACE_WINDOW_SECS,
            ),
            max_scan_items: env_parse("MAX_SCAN_ITEMS", constants::DEFAULT_MAX_SCAN_ITEMS),
            safe_mode: env_parse("SAFE_MODE", false),
            max_memory_usage_percent: env_parse("MAX_MEMORY_USAGE_PERCENT", 90.0),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            anyhow::bail!("MAX_FILE_SIZE_BYTES must be greater than zero");
        }
        if self.compression_threshold_bytes > self.max_file_size_bytes {
            anyhow::bail!("COMPRESSION_THRESHOLD_BYTES must not exceed MAX_FILE_SIZE_BYTES");
        }
        if !(0.0..=1.0).contains(&self.encode_quality) {
            anyhow::bail!("ENCODE_QUALITY must be between 0.0 and 1.0");
        }
        if self.encode_max_dimension == 0 {
            anyhow::bail!("ENCODE_MAX_DIMENSION must be greater than zero");
        }
        if self.grace_window_secs < 0 {
            anyhow::bail!("GRACE_WINDOW_SECS must not be negative");
        }
        if self.is_production() && self.api_token.len() < 16 {
            anyhow::bail!("API_TOKEN must be at least 16 characters in production");
        }
        Ok(())
    }
}
