//! Timestamp extraction rules.

use std::path::Path;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ConfigError;

/// Path component a timestamp rule is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RuleTarget {
    /// Name of the immediate parent directory.
    Parent,
    /// Base name of the file itself.
    Name,
}

/// A single date pattern bound to a path component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRule {
    /// Which component the pattern is matched against.
    pub applies_to: RuleTarget,
    /// strftime-style pattern matched against a prefix of the component.
    pub pattern: String,
}

impl TimestampRule {
    /// Create a rule, validating its pattern.
    pub fn new(applies_to: RuleTarget, pattern: impl Into<String>) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        validate_pattern(&pattern).map_err(|message| {
            ConfigError::rule(format!("{applies_to}:{pattern}"), message)
        })?;
        Ok(Self {
            applies_to,
            pattern,
        })
    }

    /// Select the component of `path` this rule looks at.
    pub fn component<'a>(&self, path: &'a Path) -> Option<&'a str> {
        match self.applies_to {
            RuleTarget::Parent => path.parent()?.file_name()?.to_str(),
            RuleTarget::Name => path.file_name()?.to_str(),
        }
    }
}

impl FromStr for TimestampRule {
    type Err = ConfigError;

    /// Parse `applies-to:pattern`, e.g. `parent:%Y_%m_%d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, pattern) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::rule(s, "expected <parent|name>:<pattern>"))?;
        let applies_to = target
            .trim()
            .parse::<RuleTarget>()
            .map_err(|_| ConfigError::rule(s, format!("unknown component '{target}'")))?;
        Self::new(applies_to, pattern)
    }
}

impl std::fmt::Display for TimestampRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.applies_to, self.pattern)
    }
}

/// Check that a strftime pattern is usable.
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if pattern.is_empty() {
        return Err("Pattern cannot be empty".into());
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(format!("'{pattern}' contains an invalid format item"));
    }
    Ok(())
}

/// Ordered list of timestamp rules.
///
/// Loaded from TOML of the form:
///
/// ```toml
/// [[rule]]
/// applies_to = "parent"
/// pattern = "%Y_%m_%d"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, rename = "rule")]
    rules: Vec<TimestampRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let builtin = [
            (RuleTarget::Parent, "%Y_%m_%d"),
            (RuleTarget::Parent, "%Y-%m-%d"),
            (RuleTarget::Name, "IMG-%Y%m%d-WA"),
            (RuleTarget::Name, "IMG_%Y%m%d"),
            (RuleTarget::Name, "%Y-%m-%d"),
        ];
        Self {
            rules: builtin
                .into_iter()
                .map(|(applies_to, pattern)| TimestampRule {
                    applies_to,
                    pattern: pattern.to_string(),
                })
                .collect(),
        }
    }
}

impl RuleSet {
    /// Create a rule set from explicit rules.
    pub fn new(rules: Vec<TimestampRule>) -> Self {
        Self { rules }
    }

    /// Parse a rule set from TOML text.
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let set: Self = toml::from_str(text).map_err(|source| ConfigError::RulesParse {
            path: path.to_path_buf(),
            source,
        })?;
        for rule in &set.rules {
            validate_pattern(&rule.pattern)
                .map_err(|message| ConfigError::rule(rule.to_string(), message))?;
        }
        Ok(set)
    }

    /// Load a rule set from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::RulesFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &text)
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[TimestampRule] {
        &self.rules
    }

    /// Append a rule with the lowest priority.
    pub fn push(&mut self, rule: TimestampRule) {
        self.rules.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_vec(self) -> Vec<TimestampRule> {
        self.rules
    }
}
