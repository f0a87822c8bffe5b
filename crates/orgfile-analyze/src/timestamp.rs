//! Calendar date extraction from paths.
//!
//! Photos are often stored in directories that look like
//! `x/2008_02_03/IMG12343.CRW` or carry the date in their own name
//! (`IMG_20200105_101500.jpg`). Rules are tried in priority order against a
//! single path component each; the first rule that parses wins. When no
//! rule matches, the file's modification time is used. Creation time is
//! never consulted: moving a file may reset it, modification time survives.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use orgfile_core::{RuleSet, TimestampRule};

/// Where an extracted date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSource {
    /// Matched the rule at this index.
    Rule(usize),
    /// Fell back to the filesystem modification time.
    Modified,
}

/// A date found for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

/// Applies timestamp rules to paths.
#[derive(Debug, Clone, Default)]
pub struct TimestampExtractor {
    rules: Vec<TimestampRule>,
}

impl TimestampExtractor {
    /// Create an extractor with the given rules.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: rules.into_vec(),
        }
    }

    /// Find a date for `path`.
    ///
    /// Returns `None` ("date unknown") only when no rule matches and the
    /// file's metadata cannot be read.
    pub fn extract(&self, path: &Path) -> Option<ExtractedDate> {
        if let Some((date, index)) = self.match_rules(path) {
            return Some(ExtractedDate {
                date,
                source: DateSource::Rule(index),
            });
        }

        modified_date(path).map(|date| ExtractedDate {
            date,
            source: DateSource::Modified,
        })
    }

    /// Try the rules only, without touching the filesystem.
    pub fn match_rules(&self, path: &Path) -> Option<(NaiveDate, usize)> {
        self.rules.iter().enumerate().find_map(|(index, rule)| {
            let component = rule.component(path)?;
            parse_date_prefix(component, &rule.pattern).map(|date| (date, index))
        })
    }

    pub fn rules(&self) -> &[TimestampRule] {
        &self.rules
    }
}

/// Parse a date from the start of `text`, ignoring whatever follows.
pub fn parse_date_prefix(text: &str, pattern: &str) -> Option<NaiveDate> {
    NaiveDate::parse_and_remainder(text, pattern)
        .ok()
        .map(|(date, _rest)| date)
}

/// Local calendar date of the file's last modification.
pub fn modified_date(path: &Path) -> Option<NaiveDate> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified).date_naive())
}
