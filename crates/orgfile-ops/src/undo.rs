//! Replaying action records backwards.
//!
//! Undo reads records emitted by earlier runs and reverses them newest
//! first. Moves are reversed with the same move primitive; removed
//! duplicates are restored by copying the surviving file back. No digests
//! are computed.

use std::path::Path;

use tracing::{debug, warn};

use crate::mover::{FsMover, Mover};
use crate::operation::Classification;
use crate::record::{ActionRecord, RecordKind};
use crate::OpError;

/// Outcome of replaying a record log.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Records successfully reversed (or that would be, in a dry run).
    pub restored: usize,
    /// Records with nothing to reverse.
    pub skipped: usize,
    /// Reversals that failed, with the reason.
    pub failed: Vec<(std::path::PathBuf, String)>,
    /// Input lines that were not valid records.
    pub malformed: usize,
    /// One record per reversal attempted, in replay order.
    pub records: Vec<ActionRecord>,
}

impl UndoReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.malformed == 0
    }
}

/// Reverses previously logged actions.
pub struct UndoReplayer {
    mover: Box<dyn Mover>,
    commit: bool,
}

impl Default for UndoReplayer {
    fn default() -> Self {
        Self::new(FsMover, false)
    }
}

impl UndoReplayer {
    pub fn new(mover: impl Mover + 'static, commit: bool) -> Self {
        Self {
            mover: Box::new(mover),
            commit,
        }
    }

    /// Parse `lines` and reverse every actionable record, newest first.
    ///
    /// Lines that are not valid UTF-8 count as malformed.
    pub fn replay<I, S>(&self, lines: I) -> UndoReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut report = UndoReport::default();
        let mut records = Vec::new();

        for (n, line) in lines.into_iter().enumerate() {
            let Ok(line) = std::str::from_utf8(line.as_ref()) else {
                warn!(line = n + 1, "skipping record that is not valid UTF-8");
                report.malformed += 1;
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match ActionRecord::parse_line(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "skipping malformed record");
                    report.malformed += 1;
                }
            }
        }

        for record in records.iter().rev() {
            self.reverse(record, &mut report);
        }
        report
    }

    fn reverse(&self, record: &ActionRecord, report: &mut UndoReport) {
        let Some(class) = reversible(record) else {
            report.skipped += 1;
            return;
        };
        let Some(ref target) = record.target else {
            report.skipped += 1;
            return;
        };

        let comment = if class.removes_duplicate() {
            "restore duplicate"
        } else {
            "move file back"
        };
        let mut undo = ActionRecord {
            kind: RecordKind::Undo,
            source: target.clone(),
            target: Some(record.source.clone()),
            comment: comment.to_string(),
            committed: Some(false),
        };

        if !self.commit {
            debug!(from = %target.display(), to = %record.source.display(), "would restore");
            report.restored += 1;
            report.records.push(undo);
            return;
        }

        match self.restore(class, target, &record.source) {
            Ok(()) => {
                debug!(from = %target.display(), to = %record.source.display(), "restored");
                undo.committed = Some(true);
                report.restored += 1;
            }
            Err(e) => {
                warn!(path = %record.source.display(), error = %e, "restore failed");
                report.failed.push((record.source.clone(), e.to_string()));
            }
        }
        report.records.push(undo);
    }

    fn restore(&self, class: Classification, from: &Path, to: &Path) -> Result<(), OpError> {
        if to.exists() {
            return Err(OpError::TargetExists {
                path: to.to_path_buf(),
            });
        }
        if let Some(parent) = to.parent() {
            self.mover.create_dirs(parent)?;
        }
        if class.removes_duplicate() {
            self.mover.copy_file(from, to)?;
        } else {
            self.mover.move_file(from, to)?;
        }
        Ok(())
    }
}

/// Classification of a record that undo acts on.
///
/// Undo records and records explicitly marked uncommitted are ignored.
fn reversible(record: &ActionRecord) -> Option<Classification> {
    if record.kind == RecordKind::Undo || record.committed == Some(false) {
        return None;
    }
    record
        .classification()
        .filter(|class| class.is_actionable())
}
