//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run before any input is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Target directory does not exist.
    #[error("Target directory doesn't seem to exist: {path}")]
    TargetDirMissing { path: PathBuf },

    /// Target path exists but is not a directory.
    #[error("Target path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Move mode was requested without a target directory.
    #[error("A target directory is required for this mode")]
    TargetDirRequired,

    /// Date template cannot render a relative subdirectory.
    #[error("Invalid date template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    /// A timestamp rule could not be parsed.
    #[error("Invalid timestamp rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    /// The rules file could not be read.
    #[error("Failed to read rules file {path}: {source}")]
    RulesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rules file is not valid TOML.
    #[error("Failed to parse rules file {path}: {source}")]
    RulesParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a rule error.
    pub fn rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        }
    }
}
