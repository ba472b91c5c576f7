use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{error::ClientError, retry::TransportRetry};

/// Connection settings for the gRPC control plane client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Control plane endpoint, e.g. `http://localhost:9090`.
    pub address: String,
    pub connect_timeout_ms: u64,
    /// Per-request deadline.
    pub request_timeout_ms: u64,
    pub transport_retry: TransportRetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportRetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for TransportRetryConfig {
    fn default() -> Self {
        let policy = TransportRetry::default();
        Self {
            max_retries: policy.max_retries,
            delay_ms: policy.delay_ms,
        }
    }
}

impl From<TransportRetryConfig> for TransportRetry {
    fn from(cfg: TransportRetryConfig) -> Self {
        TransportRetry {
            max_retries: cfg.max_retries,
            delay_ms: cfg.delay_ms,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:9090".to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            transport_retry: TransportRetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(ClientError::InvalidConfig(
                "control plane address cannot be empty".into(),
            ));
        }
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "control plane address must start with http:// or https://, got {address:?}"
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
