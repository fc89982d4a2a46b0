//! Hydration configuration
//!
//! Defaults suit the `alias__field` column encoding. Values can be overridden
//! from the environment (`ELIF_HYDRATE_*`) or from a YAML file.

use std::env;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HydrateError, HydrateResult};
use crate::parser::DEFAULT_KEY_SEPARATOR;

pub const ENV_KEY_SEPARATOR: &str = "ELIF_HYDRATE_KEY_SEPARATOR";
pub const ENV_AGGREGATE_POLICY: &str = "ELIF_HYDRATE_AGGREGATE_POLICY";
pub const ENV_RESET_ON_NEW_ROOT: &str = "ELIF_HYDRATE_RESET_ON_NEW_ROOT";

/// What to do with aggregate columns of a row that produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatePolicy {
    /// Map aggregates only onto a record instantiated from the same row
    FreshOnly,
    /// Map aggregates onto the last record instantiated for the alias
    CarryOver,
}

impl Default for AggregatePolicy {
    fn default() -> Self {
        AggregatePolicy::FreshOnly
    }
}

impl FromStr for AggregatePolicy {
    type Err = HydrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fresh_only" | "fresh" => Ok(AggregatePolicy::FreshOnly),
            "carry_over" | "carry" => Ok(AggregatePolicy::CarryOver),
            _ => Err(HydrateError::Configuration(format!(
                "invalid aggregate policy '{}', expected fresh_only or carry_over",
                s
            ))),
        }
    }
}

/// Hydration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    /// Separator between table alias and field in result column keys
    pub key_separator: String,
    pub aggregate_policy: AggregatePolicy,
    /// Forget previous child sub-rows whenever a new root record starts
    pub reset_on_new_root: bool,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
            aggregate_policy: AggregatePolicy::default(),
            reset_on_new_root: true,
        }
    }
}

impl HydrationConfig {
    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> HydrateResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> HydrateResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(separator) = lookup(ENV_KEY_SEPARATOR) {
            config.key_separator = separator;
        }

        if let Some(policy) = lookup(ENV_AGGREGATE_POLICY) {
            config.aggregate_policy = policy.parse()?;
        }

        if let Some(reset) = lookup(ENV_RESET_ON_NEW_ROOT) {
            config.reset_on_new_root = reset.parse().map_err(|_| {
                HydrateError::Configuration(format!(
                    "invalid value '{}' for {}, expected true or false",
                    reset, ENV_RESET_ON_NEW_ROOT
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file; missing keys keep their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> HydrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HydrateError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HydrateResult<()> {
        if self.key_separator.is_empty() {
            return Err(HydrateError::Configuration(
                "key_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
