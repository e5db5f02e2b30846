//! File-based configuration.
//!
//! [`PipelineConfig`] mirrors the [`ExecCtx`] builder settings so a
//! deployment can be described in JSON (or YAML with the `yaml` feature).
//! Every field has a default.

use crate::error::Result;
use crate::exec_ctx::{ExecCtx, ExecCtxBuilder};
use crate::retry::RetryPolicy;
use crate::store::{JsonFileErrorStore, DEFAULT_CAPACITY};
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Serializable pipeline settings.
///
/// # Example
///
/// ```
/// use content_gen_pipeline::config::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(r#"{"base_url": "http://localhost:5000", "max_retries": 4}"#).unwrap();
/// assert_eq!(config.max_retries, 4);
/// assert_eq!(config.timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub retry_timeouts: bool,
    pub retryable_statuses: Vec<u16>,
    /// Durable error log file. In-memory when unset.
    pub error_log_path: Option<PathBuf>,
    pub error_log_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_ms: 30_000,
            max_retries: retry.max_retries,
            initial_delay_ms: 1000,
            multiplier: retry.multiplier,
            max_delay_ms: 30_000,
            retry_timeouts: retry.retry_timeouts,
            retryable_statuses: retry.retryable_statuses,
            error_log_path: None,
            error_log_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. `.yaml`/`.yml` need the `yaml` feature; anything
    /// else is read as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            return Self::parse_yaml(path, &data);
        }
        Self::from_json_str(&data)
    }

    #[cfg(feature = "yaml")]
    fn parse_yaml(_path: &Path, data: &str) -> Result<Self> {
        Self::from_yaml_str(data)
    }

    #[cfg(not(feature = "yaml"))]
    fn parse_yaml(path: &Path, _data: &str) -> Result<Self> {
        Err(PipelineError::InvalidConfig(format!(
            "{} is YAML but the `yaml` feature is disabled",
            path.display()
        )))
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("base_url is empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            retryable_statuses: self.retryable_statuses.clone(),
            retry_timeouts: self.retry_timeouts,
            ..RetryPolicy::default()
        }
    }

    /// A builder preloaded with these settings.
    pub fn builder(&self) -> ExecCtxBuilder {
        let mut builder = ExecCtx::builder(&self.base_url)
            .timeout(Duration::from_millis(self.timeout_ms))
            .retry(self.retry_policy());
        if let Some(ref path) = self.error_log_path {
            builder = builder.error_store(Arc::new(JsonFileErrorStore::with_capacity(
                path,
                self.error_log_capacity,
            )));
        }
        builder
    }

    pub fn build(&self) -> ExecCtx {
        self.builder().build()
    }
}
