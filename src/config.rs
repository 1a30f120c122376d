//! Accumulator configuration.
//!
//! Deserializable from any serde source; the server embeds it in its own
//! layered configuration.
//!
//! ```toml
//! [accumulator]
//! dim = 3
//! store_timeout = 500   # milliseconds
//!
//! [accumulator.retry]
//! max_attempts = 16
//! base_delay = 2
//! max_delay = 100
//! deadline = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::RetryPolicy;

/// Errors raised by [`AccumulatorConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dim must be at least 1")]
    ZeroDimension,

    #[error("store_timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccumulatorConfig {
    /// Fixed vector dimensionality of the deployment.
    #[serde(default = "default_dim")]
    pub dim: usize,

    /// Bound on every individual store call, in milliseconds.
    #[serde(default = "default_store_timeout", with = "crate::serde_millis")]
    pub store_timeout: Duration,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            dim: default_dim(),
            store_timeout: default_store_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AccumulatorConfig {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

fn default_dim() -> usize {
    3
}

fn default_store_timeout() -> Duration {
    Duration::from_millis(500)
}
