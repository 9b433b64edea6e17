//! Error types for the docflow engine.
//!
//! Wiring-time problems (unknown stage types, presets, event names) are
//! `ConfigError`s; everything that can go wrong while a pipeline is running
//! surfaces as a `DocflowError` variant.

use thiserror::Error;

use crate::plugin::PluginKind;

/// The main error type for docflow operations.
#[derive(Debug, Error)]
pub enum DocflowError {
    /// A configuration error occurred while wiring a pipeline.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A plugin was not found in the registry at execution time.
    #[error("{kind} plugin not found: {name}")]
    PluginNotFound {
        /// The plugin kind that was looked up.
        kind: PluginKind,
        /// The missing plugin name.
        name: String,
    },

    /// A stage's plugin call failed.
    #[error("stage '{stage}' failed: {message}")]
    StageExecution {
        /// The stage name.
        stage: String,
        /// The underlying failure message.
        message: String,
    },

    /// A stage attempt exceeded its configured timeout.
    #[error("stage '{stage}' timed out after {timeout_secs}s")]
    StageTimeout {
        /// The stage name.
        stage: String,
        /// The configured timeout in seconds.
        timeout_secs: f64,
    },

    /// A concurrent executor problem (pool shut down, worker task lost).
    #[error("executor error: {0}")]
    Executor(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DocflowError {
    /// Creates a plugin-not-found error.
    #[must_use]
    pub fn plugin_not_found(kind: PluginKind, name: impl Into<String>) -> Self {
        Self::PluginNotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a stage execution error.
    #[must_use]
    pub fn stage_execution(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a stage timeout error.
    #[must_use]
    pub fn stage_timeout(stage: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::StageTimeout {
            stage: stage.into(),
            timeout_secs: timeout.as_secs_f64(),
        }
    }

    /// Returns true if this error came from a registry miss.
    #[must_use]
    pub fn is_plugin_not_found(&self) -> bool {
        matches!(self, Self::PluginNotFound { .. })
    }

    /// Returns true if this error came from a stage timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StageTimeout { .. })
    }
}

/// Error raised when a pipeline is wired from invalid configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A declarative stage definition used an unknown type string.
    #[error("unknown stage type: '{0}' (expected source, processor or extractor)")]
    UnknownStageType(String),

    /// An unknown preset name was requested.
    #[error("unknown preset: '{name}'. Available: {}", available.join(", "))]
    UnknownPreset {
        /// The requested preset name.
        name: String,
        /// The preset names that do exist.
        available: Vec<String>,
    },

    /// An unknown hook event name was used.
    #[error("unknown hook event: '{0}'")]
    UnknownEvent(String),

    /// A stage definition was structurally invalid.
    #[error("invalid stage definition: {0}")]
    InvalidStage(String),
}
