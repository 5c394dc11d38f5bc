//! Client configuration.
//!
//! `ClientConfig` deserializes from any serde format with every field
//! optional, or is read from the environment with [`ClientConfig::from_env`]:
//!
//! - `PRINTNODE_API_URL` (optional): base URL, defaults to
//!   `https://api.printnode.com`
//! - `PRINTNODE_TIMEOUT_SECS` (optional): per-call timeout, defaults to 4

use std::time::Duration;

use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.printnode.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 4;

pub const BASE_URL_ENV: &str = "PRINTNODE_API_URL";
pub const TIMEOUT_ENV: &str = "PRINTNODE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("printnode-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                ApiError::ConfigurationError(format!("{TIMEOUT_ENV} must be whole seconds, got {raw:?}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Timeouts are kept in whole seconds; a fractional part rounds up, so
    /// any non-zero duration stays valid.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiError::ConfigurationError(format!(
                "base URL must be http(s), got {:?}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ApiError::ConfigurationError("timeout must be at least one second".to_string()));
        }
        Ok(())
    }
}
