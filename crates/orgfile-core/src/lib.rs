//! Core types and configuration for orgfile.
//!
//! This crate provides the fundamental data structures shared by the
//! orgfile crates: content digests, timestamp rules, run configuration
//! and the configuration error type.

mod config;
mod digest;
mod error;
mod rule;

pub use config::{
    expand_tilde, validate_template, Mode, OrgConfig, OrgConfigBuilder, DEFAULT_TEMPLATE,
};
pub use digest::Digest;
pub use error::ConfigError;
pub use rule::{validate_pattern, RuleSet, RuleTarget, TimestampRule};
