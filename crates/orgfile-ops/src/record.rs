//! Action records: the audit log that doubles as undo input.
//!
//! Text form, one record per line:
//!
//! ```text
//! orgfile.file  pathname:a/2020-01-05/x.jpg  tgtfile:/out/2020/2020-01-05/x.jpg  comment:"move file"  committed:true
//! orgfile.dedup  pathname:b/x.jpg  orig:a/x.jpg  comment:"file is a duplicate"  committed:false
//! ```
//!
//! Values containing whitespace, quotes or backslashes are double-quoted
//! with backslash escapes. The JSON form carries the same fields.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::operation::{Classification, Decision};

const PREFIX: &str = "orgfile.";

/// Which pipeline produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Move pipeline.
    File,
    /// Dedup pipeline.
    Dedup,
    /// Undo replay.
    Undo,
}

impl RecordKind {
    /// Key under which the target path is written.
    fn target_key(self) -> &'static str {
        match self {
            Self::File | Self::Undo => "tgtfile",
            Self::Dedup => "orig",
        }
    }
}

/// Output encoding for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Text,
    Json,
}

/// One logged decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: RecordKind,
    #[serde(rename = "pathname", serialize_with = "lossy_path")]
    pub source: PathBuf,
    #[serde(
        rename = "tgtfile",
        alias = "orig",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "lossy_target"
    )]
    pub target: Option<PathBuf>,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<bool>,
}

impl ActionRecord {
    /// Uncommitted record for a decision.
    ///
    /// Actionable decisions start as `committed: false`; the executor flips
    /// the flag once the filesystem change succeeds.
    pub fn from_decision(decision: &Decision) -> Self {
        Self {
            kind: decision.kind,
            source: decision.source.clone(),
            target: decision.target.clone(),
            comment: decision.classification.comment().to_string(),
            committed: decision.is_actionable().then_some(false),
        }
    }

    /// Classification recovered from the comment.
    pub fn classification(&self) -> Option<Classification> {
        Classification::from_comment(&self.comment)
    }

    /// Render in the given format, without a trailing newline.
    pub fn render(&self, format: RecordFormat) -> String {
        match format {
            RecordFormat::Text => self.to_string(),
            // Every field serializes as a string or bool, which cannot fail.
            RecordFormat::Json => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Parse a line in either text or JSON form.
    pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
        let line = line.trim();
        if line.starts_with('{') {
            return serde_json::from_str(line).map_err(RecordParseError::Json);
        }
        line.parse()
    }
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.kind)?;
        write_field(f, "pathname", &self.source.to_string_lossy())?;
        match (&self.target, self.kind) {
            (Some(target), kind) => write_field(f, kind.target_key(), &target.to_string_lossy())?,
            (None, RecordKind::File) => write_field(f, "tgtfile", "")?,
            (None, _) => {}
        }
        write_field(f, "comment", &self.comment)?;
        if let Some(committed) = self.committed {
            write_field(f, "committed", if committed { "true" } else { "false" })?;
        }
        Ok(())
    }
}

/// Paths that are not valid UTF-8 are written lossily, as in the text form.
fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

fn lossy_target<S: Serializer>(target: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error> {
    match target {
        Some(path) => lossy_path(path, serializer),
        None => serializer.serialize_none(),
    }
}

fn write_field(f: &mut fmt::Formatter<'_>, key: &str, value: &str) -> fmt::Result {
    write!(f, "  {key}:")?;
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return f.write_str(value);
    }
    f.write_char('"')?;
    for c in value.chars() {
        if c == '"' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('"')
}

/// Why a record line could not be read back.
#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("Line does not start with an orgfile record tag")]
    MissingTag,

    #[error("Unknown record kind '{0}'")]
    UnknownKind(String),

    #[error("Malformed field near '{0}'")]
    MalformedField(String),

    #[error("Unterminated quoted value for '{0}'")]
    Unterminated(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid committed flag '{0}'")]
    InvalidFlag(String),

    #[error("Invalid JSON record: {0}")]
    Json(#[source] serde_json::Error),
}

impl FromStr for ActionRecord {
    type Err = RecordParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let rest = line.strip_prefix(PREFIX).ok_or(RecordParseError::MissingTag)?;
        let tag_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let kind: RecordKind = rest[..tag_end]
            .parse()
            .map_err(|_| RecordParseError::UnknownKind(rest[..tag_end].to_string()))?;

        let mut source = None;
        let mut target = None;
        let mut comment = String::new();
        let mut committed = None;

        for (key, value) in parse_fields(&rest[tag_end..])? {
            match key {
                "pathname" | "source" => source = Some(PathBuf::from(value)),
                "tgtfile" | "orig" | "target" => {
                    target = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                "comment" => comment = value,
                "committed" => {
                    committed = Some(match value.as_str() {
                        "true" | "Y" | "y" | "1" => true,
                        "false" | "N" | "n" | "0" => false,
                        _ => return Err(RecordParseError::InvalidFlag(value)),
                    })
                }
                // Unknown keys are tolerated so newer logs stay readable.
                _ => {}
            }
        }

        Ok(Self {
            kind,
            source: source.ok_or(RecordParseError::MissingField("pathname"))?,
            target,
            comment,
            committed,
        })
    }
}

/// Split `key:value` pairs separated by whitespace.
fn parse_fields(mut rest: &str) -> Result<Vec<(&str, String)>, RecordParseError> {
    let mut fields = Vec::new();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let colon = rest
            .find(':')
            .ok_or_else(|| RecordParseError::MalformedField(rest.to_string()))?;
        let key = &rest[..colon];
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(RecordParseError::MalformedField(rest.to_string()));
        }
        rest = &rest[colon + 1..];

        if let Some(quoted) = rest.strip_prefix('"') {
            let mut value = String::new();
            let mut end = None;
            let mut chars = quoted.char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some((_, escaped)) => value.push(escaped),
                        None => break,
                    },
                    '"' => {
                        end = Some(i + 1);
                        break;
                    }
                    _ => value.push(c),
                }
            }
            let end = end.ok_or_else(|| RecordParseError::Unterminated(key.to_string()))?;
            fields.push((key, value));
            rest = &quoted[end..];
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            fields.push((key, rest[..end].to_string()));
            rest = &rest[end..];
        }
    }

    Ok(fields)
}
