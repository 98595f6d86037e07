//! Configuration System
//!
//! Layered configuration for sequence runtime tuning and logging. Sources, lowest
//! precedence first: built-in defaults, the global config file, an explicit
//! config file, then `STEPWISE__SECTION__KEY` environment variables.

use crate::error::SequenceError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepwiseConfig {
    /// Enumerator tuning
    #[serde(default)]
    pub enumerator: EnumeratorConfig,

    /// Blocking adapter runtime
    #[serde(default)]
    pub blocking: BlockingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Enumerator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumeratorConfig {
    /// How long `dispose` waits for a producer task to unwind before aborting it
    #[serde(default = "default_dispose_timeout_ms")]
    pub dispose_timeout_ms: u64,
}

fn default_dispose_timeout_ms() -> u64 {
    5_000
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            dispose_timeout_ms: default_dispose_timeout_ms(),
        }
    }
}

/// Runtime used by the blocking iteration adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Worker threads; 0 selects a current-thread runtime
    #[serde(default)]
    pub worker_threads: usize,

    /// Thread name for runtime workers
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "stepwise-blocking".to_string()
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            thread_name: default_thread_name(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Enumerator(String),
    Blocking(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Enumerator(msg) => write!(f, "Enumerator: {}", msg),
            ValidationError::Blocking(msg) => write!(f, "Blocking: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StepwiseConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.enumerator.dispose_timeout_ms == 0 {
            errors.push(ValidationError::Enumerator(
                "dispose_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.blocking.thread_name.trim().is_empty() {
            errors.push(ValidationError::Blocking(
                "thread_name cannot be empty".to_string(),
            ));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`StepwiseConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global config file (if present), an optional explicit
    /// file, and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<StepwiseConfig, SequenceError> {
        let global = global_config_path();
        Self::load_layered(global.as_deref(), explicit)
    }

    /// Load from a single file plus environment overrides.
    pub fn load_from_file(path: &Path) -> Result<StepwiseConfig, SequenceError> {
        Self::load_layered(None, Some(path))
    }

    /// Built-in defaults only.
    pub fn default() -> StepwiseConfig {
        StepwiseConfig::default()
    }

    pub(crate) fn load_layered(
        global: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<StepwiseConfig, SequenceError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        if let Some(global) = global {
            builder = sources::global_file::add_to_builder(builder, global)?;
        }
        if let Some(explicit) = explicit {
            builder = sources::explicit_file::add_to_builder(builder, explicit)?;
        }
        builder = sources::environment::add_to_builder(builder);

        let config: StepwiseConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SequenceError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
