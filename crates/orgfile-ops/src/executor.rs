//! Applies decisions to the filesystem and the registry.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use orgfile_analyze::{EntryId, IdentityRegistry};

use crate::mover::{FsMover, Mover};
use crate::operation::{Classification, Decision};
use crate::record::ActionRecord;
use crate::OpError;

/// Result of executing one decision.
#[derive(Debug, Clone)]
pub struct Execution {
    pub record: ActionRecord,
    pub classification: Classification,
    /// Bytes moved, or bytes freed by removing a duplicate.
    pub bytes: u64,
    /// Whether a committed action failed.
    pub failed: bool,
}

/// Performs the physical effect of a decision in commit mode.
///
/// In dry-run mode nothing on disk or in the registry changes; the record
/// still says what would have happened.
pub struct Executor {
    mover: Box<dyn Mover>,
    commit: bool,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(FsMover, false)
    }
}

impl Executor {
    pub fn new(mover: impl Mover + 'static, commit: bool) -> Self {
        Self {
            mover: Box::new(mover),
            commit,
        }
    }

    pub fn is_commit(&self) -> bool {
        self.commit
    }

    /// Execute `decision` and produce its action record.
    pub fn execute(&self, registry: &mut IdentityRegistry, decision: &Decision) -> Execution {
        let mut record = ActionRecord::from_decision(decision);
        let classification = decision.classification;

        let Some(target) = decision.target.as_deref().filter(|_| decision.is_actionable()) else {
            return Execution {
                record,
                classification,
                bytes: 0,
                failed: false,
            };
        };

        if !self.commit {
            let bytes = file_size(&decision.source);
            debug!(
                source = %decision.source.display(),
                target = %target.display(),
                action = %classification,
                "dry run"
            );
            return Execution {
                record,
                classification,
                bytes,
                failed: false,
            };
        }

        let result = match classification {
            Classification::Move | Classification::MoveRenamed => {
                self.commit_move(registry, decision, target)
            }
            Classification::DuplicateMove => {
                self.commit_duplicate_move(registry, decision, target)
            }
            Classification::DuplicateDelete => self.commit_delete(registry, decision, target),
            _ => Ok(0),
        };

        match result {
            Ok(bytes) => {
                debug!(
                    source = %decision.source.display(),
                    target = %target.display(),
                    action = %classification,
                    "committed"
                );
                record.committed = Some(true);
                Execution {
                    record,
                    classification,
                    bytes,
                    failed: false,
                }
            }
            Err(e) => {
                warn!(
                    source = %decision.source.display(),
                    error = %e,
                    "action failed"
                );
                record.committed = Some(false);
                Execution {
                    record,
                    classification,
                    bytes: 0,
                    failed: true,
                }
            }
        }
    }

    fn commit_move(
        &self,
        registry: &mut IdentityRegistry,
        decision: &Decision,
        target: &Path,
    ) -> Result<u64, OpError> {
        if let Some(parent) = target.parent() {
            self.mover.create_dirs(parent)?;
        }
        let bytes = self.mover.move_file(&decision.source, target)?;

        let entry = decision
            .source_entry
            .or_else(|| registry.lookup(&decision.source));
        match entry {
            Some(id) => {
                registry.rebind(id, target);
            }
            // Digest never computed; drop whatever was registered at the target.
            None => registry.forget_path(target),
        }
        Ok(bytes)
    }

    fn commit_duplicate_move(
        &self,
        registry: &mut IdentityRegistry,
        decision: &Decision,
        target: &Path,
    ) -> Result<u64, OpError> {
        let source = self.verified_duplicate(registry, decision, target)?;
        let bytes = file_size(&decision.source);

        self.mover.delete_file(&decision.source)?;
        registry.rebind(source, target);
        Ok(bytes)
    }

    fn commit_delete(
        &self,
        registry: &mut IdentityRegistry,
        decision: &Decision,
        survivor: &Path,
    ) -> Result<u64, OpError> {
        let source = self.verified_duplicate(registry, decision, survivor)?;
        let bytes = file_size(&decision.source);

        self.mover.delete_file(&decision.source)?;
        registry.mark_deleted(source);
        Ok(bytes)
    }

    /// Confirm the survivor is on disk and proven identical to the source.
    fn verified_duplicate(
        &self,
        registry: &mut IdentityRegistry,
        decision: &Decision,
        survivor: &Path,
    ) -> Result<EntryId, OpError> {
        if !survivor.exists() {
            return Err(OpError::SurvivorMissing {
                path: survivor.to_path_buf(),
            });
        }

        let not_verified = || OpError::NotVerified {
            path: decision.source.clone(),
        };
        let source = decision.source_entry.ok_or_else(not_verified)?;
        let kept = registry.lookup(survivor).ok_or_else(not_verified)?;
        if source == kept || !registry.same_content(source, kept) {
            return Err(not_verified());
        }
        Ok(source)
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
