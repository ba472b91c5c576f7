use std::{str::FromStr, sync::Arc, time::Duration};

use hydra_client::ClientConfig;
use hydra_model::{JobDefaults, MemorySize};
use serde::{Deserialize, Serialize};

use crate::{
    backoff::{Backoff, ConstantBackoff, ExponentialBackoff, Jitter, NoBackoff},
    error::CoreError,
    wait::{WaitMode, WaitStrategy},
};

/// Where executables run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Route calls through the coordinator to the control plane.
    #[default]
    Remote,
    /// Call functions directly in this process.
    Local,
}

impl FromStr for ExecutionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(ExecutionMode::Remote),
            "local" => Ok(ExecutionMode::Local),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown execution mode {other:?} (expected: remote|local)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    #[default]
    None,
    Constant {
        delay_ms: u64,
    },
    Exponential {
        first_ms: u64,
        max_ms: u64,
        factor: f64,
        #[serde(default)]
        jitter: Jitter,
    },
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let BackoffConfig::Exponential {
            first_ms,
            max_ms,
            factor,
            ..
        } = self
        {
            if *first_ms == 0 {
                return Err(CoreError::InvalidConfig("backoff first_ms cannot be zero".into()));
            }
            if *max_ms < *first_ms {
                return Err(CoreError::InvalidConfig(
                    "backoff max_ms cannot be below first_ms".into(),
                ));
            }
            if !(factor.is_finite() && *factor >= 1.0) {
                return Err(CoreError::InvalidConfig(
                    "backoff factor must be a finite number >= 1".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Arc<dyn Backoff> {
        match *self {
            BackoffConfig::None => Arc::new(NoBackoff),
            BackoffConfig::Constant { delay_ms } => {
                Arc::new(ConstantBackoff(Duration::from_millis(delay_ms)))
            }
            BackoffConfig::Exponential {
                first_ms,
                max_ms,
                factor,
                jitter,
            } => Arc::new(
                ExponentialBackoff::new(
                    Duration::from_millis(first_ms),
                    Duration::from_millis(max_ms),
                    factor,
                )
                .with_jitter(jitter),
            ),
        }
    }
}

/// Settings of a [`crate::HydraClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraConfig {
    /// Default cpu count of built specs.
    pub cpu: u32,
    /// Default memory of built specs, e.g. `"512MB"`.
    pub memory: String,
    /// Default retry budget of built specs.
    pub retries: u32,
    pub control_plane_address: String,
    pub mode: ExecutionMode,
    pub attempt_timeout_ms: Option<u64>,
    pub poll_interval_ms: u64,
    pub wait: WaitMode,
    pub backoff: BackoffConfig,
    /// Generate job ids locally when the control plane cannot issue one.
    pub local_id_fallback: bool,
    /// Transport settings; `address` is taken from `control_plane_address`.
    pub client: ClientConfig,
}

impl Default for HydraConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            cpu: 1,
            memory: "512MB".to_string(),
            retries: 3,
            control_plane_address: client.address.clone(),
            mode: ExecutionMode::Remote,
            attempt_timeout_ms: None,
            poll_interval_ms: 250,
            wait: WaitMode::Stream,
            backoff: BackoffConfig::None,
            local_id_fallback: false,
            client,
        }
    }
}

impl HydraConfig {
    pub const ENV_CPU: &'static str = "HYDRA_CPU";
    pub const ENV_MEMORY: &'static str = "HYDRA_MEMORY";
    pub const ENV_RETRIES: &'static str = "HYDRA_RETRIES";
    pub const ENV_ADDRESS: &'static str = "HYDRA_CONTROL_PLANE_ADDRESS";
    pub const ENV_MODE: &'static str = "HYDRA_MODE";
    pub const ENV_ATTEMPT_TIMEOUT_MS: &'static str = "HYDRA_ATTEMPT_TIMEOUT_MS";

    /// Defaults overridden by `HYDRA_*` environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `HYDRA_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup(Self::ENV_CPU) {
            cfg.cpu = parse_env(Self::ENV_CPU, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_MEMORY) {
            cfg.memory = raw.trim().to_string();
        }
        if let Some(raw) = lookup(Self::ENV_RETRIES) {
            cfg.retries = parse_env(Self::ENV_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_ADDRESS) {
            cfg.control_plane_address = raw.trim().to_string();
        }
        if let Some(raw) = lookup(Self::ENV_MODE) {
            cfg.mode = raw.parse()?;
        }
        if let Some(raw) = lookup(Self::ENV_ATTEMPT_TIMEOUT_MS) {
            cfg.attempt_timeout_ms = Some(parse_env(Self::ENV_ATTEMPT_TIMEOUT_MS, &raw)?);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.defaults()?;
        if self.poll_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.attempt_timeout_ms == Some(0) {
            return Err(CoreError::InvalidConfig(
                "attempt_timeout_ms must be greater than zero when set".into(),
            ));
        }
        self.backoff.validate()?;
        self.client_config().validate()?;
        Ok(())
    }

    /// Spec defaults derived from `cpu`, `memory` and `retries`.
    pub fn defaults(&self) -> Result<JobDefaults, CoreError> {
        if self.cpu == 0 {
            return Err(CoreError::InvalidConfig("cpu must be at least 1".into()));
        }
        Ok(JobDefaults {
            cpu: self.cpu,
            memory: MemorySize::parse(&self.memory)?,
            max_retries: self.retries,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            address: self.control_plane_address.clone(),
            ..self.client.clone()
        }
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        WaitStrategy {
            mode: self.wait,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, CoreError> {
    raw.trim()
        .parse()
        .map_err(|_| CoreError::InvalidConfig(format!("{key}: invalid value {raw:?}")))
}
