//! End-of-run summary.

use std::collections::BTreeMap;

use humansize::{format_size, BINARY};

use crate::executor::Execution;
use crate::operation::Classification;
use crate::undo::UndoReport;

/// Totals accumulated over one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Records per classification.
    pub counts: BTreeMap<Classification, usize>,
    /// Actions that changed the filesystem.
    pub committed: usize,
    /// Actions attempted in commit mode that failed.
    pub failed: usize,
    /// Bytes moved into the target tree.
    pub bytes_moved: u64,
    /// Bytes freed (or freeable, in a dry run) by removing duplicates.
    pub bytes_reclaimed: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one executed decision.
    pub fn record(&mut self, execution: &Execution) {
        *self.counts.entry(execution.classification).or_default() += 1;

        if execution.failed {
            self.failed += 1;
            return;
        }
        if execution.record.committed == Some(true) {
            self.committed += 1;
        }
        if execution.classification.removes_duplicate() {
            self.bytes_reclaimed += execution.bytes;
        } else {
            self.bytes_moved += execution.bytes;
        }
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.counts.get(&classification).copied().unwrap_or(0)
    }

    /// Number of records accounted for.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        let breakdown = self
            .counts
            .iter()
            .map(|(class, n)| format!("{class}={n}"))
            .collect::<Vec<_>>()
            .join(" ");

        let mut line = format!("Processed {} paths", self.total());
        if !breakdown.is_empty() {
            line.push_str(&format!(" ({breakdown})"));
        }
        line.push_str(&format!(", {} committed", self.committed));
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        if self.bytes_moved > 0 {
            line.push_str(&format!(", {} moved", format_size(self.bytes_moved, BINARY)));
        }
        if self.bytes_reclaimed > 0 {
            line.push_str(&format!(
                ", {} reclaimable",
                format_size(self.bytes_reclaimed, BINARY)
            ));
        }
        line
    }
}

impl UndoReport {
    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!(
                "Restored {} items, {} skipped, {} malformed",
                self.restored, self.skipped, self.malformed
            )
        } else {
            format!(
                "Restored {} items, {} skipped, {} malformed, {} failed",
                self.restored,
                self.skipped,
                self.malformed,
                self.failed.len()
            )
        }
    }
}
