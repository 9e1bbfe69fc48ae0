//! Runtime configuration.
//!
//! Every threshold, timeout and path the runtime uses lives here and is
//! handed to components at construction. Loadable from YAML; every field has
//! a default, durations are humantime strings (`30s`, `1h`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use claimcheck_core::RetrievalConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::Capability;
use crate::providers::CompletionConfig;
use crate::resilience::CircuitBreakerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde adapter for humantime durations.
pub mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Fallback confidence an uncited quantitative claim must strictly
    /// exceed to be settled without a dataset
    pub high_confidence: f64,

    /// Confidence a reuse decision must strictly exceed
    pub dataset_reuse: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_confidence: 0.8,
            dataset_reuse: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Hard wall-clock ceiling per script
    #[serde(with = "duration_human")]
    pub timeout: Duration,

    /// Program that runs generated scripts
    pub interpreter: String,

    /// Cap on captured stdout and stderr, each; the newest bytes are kept
    pub max_output_bytes: usize,

    /// Where generated scripts are kept for audit; `None` disables archiving
    pub script_archive_dir: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interpreter: "python3".to_string(),
            max_output_bytes: 1024 * 1024,
            script_archive_dir: Some(PathBuf::from("generated_scripts")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(with = "duration_human")]
    pub timeout: Duration,
    pub dataset_dir: PathBuf,
    pub text_dir: PathBuf,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            dataset_dir: PathBuf::from("datasets"),
            text_dir: PathBuf::from("text_sources"),
            max_bytes: 500 * 1024 * 1024,
            user_agent: concat!("claimcheck/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactCheckConfig {
    pub endpoint: String,

    /// Inline key; `GOOGLE_FACT_CHECK_API_KEY` is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(with = "duration_human")]
    pub timeout: Duration,
    pub max_query_chars: usize,
    pub language: String,

    #[serde(with = "duration_human")]
    pub cache_ttl: Duration,
    pub cache_capacity: u64,

    /// Retries for transient failures
    pub retries: usize,
}

impl Default for FactCheckConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://factchecktools.googleapis.com/v1alpha1/claims:search".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
            max_query_chars: 512,
            language: "en".to_string(),
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 10_000,
            retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub global_max_tokens: u32,

    /// Optional ceilings for single capabilities, still bounded by the
    /// global one
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub per_capability: BTreeMap<Capability, u32>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: 200_000,
            per_capability: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Citation batches processed at once
    pub batches: usize,

    /// Uncited qualitative claims processed at once
    pub uncited_claims: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            batches: 1,
            uncited_claims: 1,
        }
    }
}

/// Which provider to build and its factory options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Passed verbatim to the provider factory
    pub options: serde_json::Value,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: "anthropic".to_string(),
            options: serde_json::json!({}),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSettings,
    pub completion: CompletionConfig,
    pub thresholds: Thresholds,
    pub retrieval: RetrievalConfig,
    pub sandbox: SandboxConfig,
    pub fetch: FetchConfig,
    pub fact_check: FactCheckConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub budgets: BudgetConfig,
    pub concurrency: ConcurrencyConfig,
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retrieval
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for (name, value) in [
            ("thresholds.high_confidence", self.thresholds.high_confidence),
            ("thresholds.dataset_reuse", self.thresholds.dataset_reuse),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
            }
        }

        for (name, value) in [
            ("sandbox.timeout", self.sandbox.timeout),
            ("fetch.timeout", self.fetch.timeout),
            ("fact_check.timeout", self.fact_check.timeout),
            ("completion.timeout", self.completion.timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        if self.sandbox.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("sandbox.interpreter is empty".to_string()));
        }
        if self.sandbox.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.max_output_bytes must be positive".to_string(),
            ));
        }
        if self.fetch.max_bytes == 0 {
            return Err(ConfigError::Invalid("fetch.max_bytes must be positive".to_string()));
        }
        if self.concurrency.batches == 0 || self.concurrency.uncited_claims == 0 {
            return Err(ConfigError::Invalid(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.fact_check.max_query_chars == 0 {
            return Err(ConfigError::Invalid(
                "fact_check.max_query_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
