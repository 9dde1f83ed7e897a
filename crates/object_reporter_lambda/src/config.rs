//! Handler configuration, read once per cold start from the environment.

use std::time::Duration;

use figment::providers::Env;
use figment::Figment;
use object_reporter_core::stack::{ENV_METADATA_TABLE_NAME, ENV_OBJECT_BUCKET_NAME};
use serde::Deserialize;

use crate::adapters::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};

pub const ENV_SCAN_PAGE_SIZE: &str = "SCAN_PAGE_SIZE";
pub const ENV_STORE_MAX_ATTEMPTS: &str = "STORE_MAX_ATTEMPTS";
pub const ENV_STORE_RETRY_BASE_DELAY_MS: &str = "STORE_RETRY_BASE_DELAY_MS";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    pub metadata_table_name: String,
    #[serde(default = "default_store_max_attempts")]
    pub store_max_attempts: u32,
    #[serde(default = "default_store_retry_base_delay_ms")]
    pub store_retry_base_delay_ms: u64,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, figment::Error> {
        Self::from_figment(Figment::from(Env::raw().only(&[
            ENV_METADATA_TABLE_NAME,
            ENV_STORE_MAX_ATTEMPTS,
            ENV_STORE_RETRY_BASE_DELAY_MS,
        ])))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let config: Self = figment.extract()?;
        require_non_empty(ENV_METADATA_TABLE_NAME, &config.metadata_table_name)?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        retry_policy(self.store_max_attempts, self.store_retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReportConfig {
    pub metadata_table_name: String,
    pub object_bucket_name: String,
    /// Upper bound on records per scan request; the store may cap it lower.
    #[serde(default)]
    pub scan_page_size: Option<u32>,
    #[serde(default = "default_store_max_attempts")]
    pub store_max_attempts: u32,
    #[serde(default = "default_store_retry_base_delay_ms")]
    pub store_retry_base_delay_ms: u64,
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, figment::Error> {
        Self::from_figment(Figment::from(Env::raw().only(&[
            ENV_METADATA_TABLE_NAME,
            ENV_OBJECT_BUCKET_NAME,
            ENV_SCAN_PAGE_SIZE,
            ENV_STORE_MAX_ATTEMPTS,
            ENV_STORE_RETRY_BASE_DELAY_MS,
        ])))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let config: Self = figment.extract()?;
        require_non_empty(ENV_METADATA_TABLE_NAME, &config.metadata_table_name)?;
        require_non_empty(ENV_OBJECT_BUCKET_NAME, &config.object_bucket_name)?;
        if config.scan_page_size == Some(0) {
            return Err(figment::Error::from(format!(
                "{ENV_SCAN_PAGE_SIZE} must be a positive integer"
            )));
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        retry_policy(self.store_max_attempts, self.store_retry_base_delay_ms)
    }
}

fn retry_policy(max_attempts: u32, base_delay_ms: u64) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms))
}

fn require_non_empty(name: &str, value: &str) -> Result<(), figment::Error> {
    if value.trim().is_empty() {
        return Err(figment::Error::from(format!("{name} cannot be empty")));
    }
    Ok(())
}

fn default_store_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_store_retry_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY.as_millis() as u64
}
