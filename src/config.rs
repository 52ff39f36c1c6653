//! Runtime configuration of the back-office core

use serde::{Deserialize, Serialize};

use crate::numbering::NumberingPolicy;
use crate::types::{HeraclionError, HeraclionResult};
use crate::utils::retry::RetryPolicy;

/// Prefix of the environment variables read by [`HeraclionConfig::from_env`]
pub const ENV_PREFIX: &str = "HERACLION";

/// Settings shared by the numbering, payroll and cash services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraclionConfig {
    /// Retry policy for transient storage failures
    pub retry: RetryPolicy,
    /// Document numbering rules
    pub numbering: NumberingPolicy,
    /// Compare-and-set rounds before a counter allocation gives up
    pub max_allocation_attempts: u32,
    /// Currency recorded on payroll lines that do not name one
    pub default_currency: String,
}

impl Default for HeraclionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            numbering: NumberingPolicy::default(),
            max_allocation_attempts: 10,
            default_currency: "MGA".to_string(),
        }
    }
}

impl HeraclionConfig {
    /// Parse a JSON document; missing keys keep their defaults
    pub fn from_json(text: &str) -> HeraclionResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| HeraclionError::InvalidArgument(format!("invalid configuration: {}", e)))
    }

    /// Read overrides from `HERACLION_*` environment variables.
    ///
    /// Nested keys are joined with `__`, e.g. `HERACLION_RETRY__DELAY_MS`.
    /// Unset keys keep their defaults; a value of the wrong type is an error.
    pub fn from_env() -> HeraclionResult<Self> {
        Self::from_environment(environment())
    }

    /// Same as [`from_env`](Self::from_env) over an explicit variable map
    pub fn from_env_vars(vars: config::Map<String, String>) -> HeraclionResult<Self> {
        Self::from_environment(environment().source(Some(vars)))
    }

    fn from_environment(source: config::Environment) -> HeraclionResult<Self> {
        config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| HeraclionError::InvalidArgument(format!("invalid configuration: {}", e)))
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn numbering(mut self, numbering: NumberingPolicy) -> Self {
        self.numbering = numbering;
        self
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
