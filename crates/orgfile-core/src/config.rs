//! Run configuration types.

use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::rule::{validate_pattern, RuleSet};
use crate::ConfigError;

/// Default subdirectory template: `2020/2020-01-05`.
pub const DEFAULT_TEMPLATE: &str = "%Y/%Y-%m-%d";

/// What a run does with each input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Relocate files into the date-partitioned tree.
    Move,
    /// Delete proven duplicates in place.
    Dedup,
    /// Replay action records backwards.
    Undo,
}

/// Configuration for a single run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct OrgConfig {
    /// Run mode.
    pub mode: Mode,

    /// Root of the date-partitioned tree (required for move).
    #[builder(default)]
    #[serde(default)]
    pub target_dir: Option<PathBuf>,

    /// Perform filesystem mutations. Dry run when false.
    #[builder(default = "false")]
    #[serde(default)]
    pub commit: bool,

    /// strftime template for the subdirectory under `target_dir`.
    #[builder(default = "DEFAULT_TEMPLATE.to_string()")]
    #[serde(default = "default_template")]
    pub template: String,

    /// Timestamp rules in priority order.
    #[builder(default)]
    #[serde(default)]
    pub rules: RuleSet,

    /// Glob restricting which paths may be deleted by dedup.
    #[builder(default)]
    #[serde(default)]
    pub dedup_filter: Option<String>,

    /// External hashing command (file content on stdin). In-process BLAKE3 when unset.
    #[builder(default)]
    #[serde(default)]
    pub hash_command: Option<String>,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl OrgConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref template) = self.template {
            validate_template(template).map_err(|e| e.to_string())?;
        }
        if self.mode == Some(Mode::Move) {
            match self.target_dir {
                Some(Some(ref dir)) if !dir.as_os_str().is_empty() => {}
                _ => return Err("Target directory is required for move".to_string()),
            }
        }
        Ok(())
    }
}

impl OrgConfig {
    /// Create a new config builder.
    pub fn builder() -> OrgConfigBuilder {
        OrgConfigBuilder::default()
    }

    /// Create a dry-run config for a mode with default settings.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            target_dir: None,
            commit: false,
            template: default_template(),
            rules: RuleSet::default(),
            dedup_filter: None,
            hash_command: None,
        }
    }

    /// Resolve and verify the target directory.
    ///
    /// Expands a leading `~` and checks that the result is an existing
    /// directory. Returns `Ok(None)` when no target directory is configured.
    pub fn checked_target_dir(&self) -> Result<Option<PathBuf>, ConfigError> {
        let Some(ref dir) = self.target_dir else {
            if self.mode == Mode::Move {
                return Err(ConfigError::TargetDirRequired);
            }
            return Ok(None);
        };

        let dir = expand_tilde(dir);
        if !dir.exists() {
            return Err(ConfigError::TargetDirMissing { path: dir });
        }
        if !dir.is_dir() {
            return Err(ConfigError::NotADirectory { path: dir });
        }
        Ok(Some(dir))
    }
}

/// Check that a subdirectory template renders a relative path from a date.
///
/// Rejects invalid strftime items, time or zone items a calendar date
/// cannot supply (`%H`, `%z`), and renderings that are absolute or contain
/// `..`.
pub fn validate_template(template: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidTemplate {
        template: template.to_string(),
        message,
    };

    validate_pattern(template).map_err(invalid)?;

    let mut rendered = String::new();
    write!(rendered, "{}", NaiveDate::default().format(template))
        .map_err(|_| invalid("only date items are allowed".to_string()))?;

    let escapes = Path::new(&rendered)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(invalid(
            "must stay inside the target directory".to_string(),
        ));
    }
    Ok(())
}

/// Expand a leading `~` to the current user's home directory.
///
/// `~user` forms are left untouched.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
