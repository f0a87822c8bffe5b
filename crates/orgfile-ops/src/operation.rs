//! Decision and error types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use orgfile_analyze::EntryId;
use orgfile_core::ConfigError;

use crate::record::RecordKind;

/// How a single input path was classified.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Source does not exist.
    NotFound,
    /// Source already sits at its canonical location.
    NoOp,
    /// Target is free; plain move.
    Move,
    /// Target holds identical content; the source folds into it.
    DuplicateMove,
    /// Target holds different content; moved under a suffixed name.
    MoveRenamed,
    /// Dedup: an earlier path holds identical content; source is removed.
    DuplicateDelete,
    /// Dedup: source is the first known copy of its content.
    Original,
    /// Dedup: no other copy known.
    Unique,
    /// Dedup: source does not match the dedup filter.
    NotEligible,
}

impl Classification {
    /// Human-readable comment written to the action record.
    pub fn comment(self) -> &'static str {
        match self {
            Self::NotFound => "file doesn't exist",
            Self::NoOp => "file already in place",
            Self::Move => "move file",
            Self::DuplicateMove => "move file (proven duplicate)",
            Self::MoveRenamed => "move file (renamed to avoid collision)",
            Self::DuplicateDelete => "file is a duplicate",
            Self::Original => "file is the original",
            Self::Unique => "file is unique",
            Self::NotEligible => "excluded by dedup filter",
        }
    }

    /// Recover a classification from a record comment.
    pub fn from_comment(comment: &str) -> Option<Self> {
        use strum::IntoEnumIterator;

        let comment = comment.trim();
        if let Some(class) = Self::iter().find(|c| c.comment() == comment) {
            return Some(class);
        }
        if comment.starts_with(Self::DuplicateDelete.comment()) {
            return Some(Self::DuplicateDelete);
        }
        comment.parse().ok()
    }

    /// Whether committing this decision changes the filesystem.
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            Self::Move | Self::DuplicateMove | Self::MoveRenamed | Self::DuplicateDelete
        )
    }

    /// Whether committing removes the source's bytes (a survivor keeps them).
    pub fn removes_duplicate(self) -> bool {
        matches!(self, Self::DuplicateMove | Self::DuplicateDelete)
    }
}

/// The engine's verdict for one source path.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Record family this decision belongs to.
    pub kind: RecordKind,
    /// Path as read from input.
    pub source: PathBuf,
    /// Where the source goes (move) or which path survives (dedup).
    pub target: Option<PathBuf>,
    pub classification: Classification,
    /// Registry handle for the source, when its digest was needed.
    pub source_entry: Option<EntryId>,
}

impl Decision {
    pub fn new(kind: RecordKind, source: impl Into<PathBuf>, classification: Classification) -> Self {
        Self {
            kind,
            source: source.into(),
            target: None,
            classification,
            source_entry: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_entry(mut self, entry: EntryId) -> Self {
        self.source_entry = Some(entry);
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.classification.is_actionable() && self.target.is_some()
    }
}

/// Errors from file operations and session setup.
#[derive(Debug, Error)]
pub enum OpError {
    /// Ancestor directories could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Move failed.
    #[error("Failed to move {from} to {to}: {message}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    /// Copy failed.
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delete failed.
    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination already exists.
    #[error("Refusing to overwrite existing {path}")]
    TargetExists { path: PathBuf },

    /// The path that should hold the surviving copy is gone.
    #[error("Surviving copy is missing: {path}")]
    SurvivorMissing { path: PathBuf },

    /// A removal was requested for content that was never compared.
    #[error("Refusing to remove {path}: content not verified")]
    NotVerified { path: PathBuf },

    /// Dedup filter is not a valid glob.
    #[error("Invalid dedup filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_comment_round_trip() {
        for class in Classification::iter() {
            assert_eq!(Classification::from_comment(class.comment()), Some(class));
        }
    }

    #[test]
    fn test_from_comment_fallbacks() {
        assert_eq!(
            Classification::from_comment("file is a duplicate)"),
            Some(Classification::DuplicateDelete)
        );
        assert_eq!(
            Classification::from_comment("move-renamed"),
            Some(Classification::MoveRenamed)
        );
        assert_eq!(Classification::from_comment("something else"), None);
    }

    #[test]
    fn test_actionable() {
        assert!(Classification::Move.is_actionable());
        assert!(Classification::DuplicateDelete.is_actionable());
        assert!(!Classification::NoOp.is_actionable());
        assert!(!Classification::NotFound.is_actionable());
        assert!(!Classification::NotEligible.is_actionable());

        let decision = Decision::new(RecordKind::File, "/a", Classification::Move);
        assert!(!decision.is_actionable());
        assert!(decision.with_target("/b").is_actionable());
    }

    #[test]
    fn test_display_is_kebab_case() {
        assert_eq!(Classification::DuplicateMove.to_string(), "duplicate-move");
        assert_eq!(Classification::NoOp.as_ref(), "no-op");
    }
}
