//! One run of the move or dedup pipeline.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use orgfile_analyze::{
    Blake3Hasher, CommandHasher, Hasher, IdentityRegistry, TargetResolver, TimestampExtractor,
};
use orgfile_core::{validate_template, ConfigError, Mode, OrgConfig};

use crate::conflict::{compile_filter, DecisionEngine};
use crate::executor::{Execution, Executor};
use crate::mover::{FsMover, Mover};
use crate::summary::RunSummary;
use crate::undo::UndoReplayer;
use crate::OpError;

/// Owns the registry and collaborators for a single pass over the input.
pub struct Session {
    mode: Mode,
    registry: IdentityRegistry,
    engine: DecisionEngine,
    executor: Executor,
    summary: RunSummary,
}

impl Session {
    /// Build a session with the in-process filesystem mover.
    pub fn from_config(config: &OrgConfig) -> Result<Self, OpError> {
        Self::with_mover(config, FsMover)
    }

    /// Build a session around a custom mover.
    pub fn with_mover(config: &OrgConfig, mover: impl Mover + 'static) -> Result<Self, OpError> {
        let engine = match config.mode {
            Mode::Move => {
                validate_template(&config.template)?;
                let root = config
                    .checked_target_dir()?
                    .ok_or(ConfigError::TargetDirRequired)?;
                info!(target_dir = %root.display(), template = %config.template, "organizing");
                DecisionEngine::for_move(TargetResolver::new(
                    root,
                    config.template.clone(),
                    TimestampExtractor::new(config.rules.clone()),
                ))
            }
            Mode::Dedup => {
                let filter = config.dedup_filter.as_deref().map(compile_filter).transpose()?;
                DecisionEngine::for_dedup(filter)
            }
            Mode::Undo => {
                return Err(ConfigError::Invalid {
                    message: "undo runs through UndoReplayer, not a session".to_string(),
                }
                .into());
            }
        };

        let registry = IdentityRegistry::new(build_hasher(config)?);

        Ok(Self {
            mode: config.mode,
            registry,
            engine,
            executor: Executor::new(mover, config.commit),
            summary: RunSummary::new(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Process one input line. Blank lines yield `None`.
    pub fn process(&mut self, line: &str) -> Option<Execution> {
        self.process_bytes(line.as_bytes())
    }

    /// Process one raw input line, which need not be valid UTF-8.
    ///
    /// A trailing `\n` or `\r\n` is stripped. Blank lines yield `None`.
    pub fn process_bytes(&mut self, line: &[u8]) -> Option<Execution> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.trim_ascii().is_empty() {
            return None;
        }
        Some(self.process_path(&path_from_bytes(line)))
    }

    /// Decide and execute for one source path.
    pub fn process_path(&mut self, source: &Path) -> Execution {
        let decision = match self.mode {
            Mode::Dedup => self.engine.decide_dedup(&mut self.registry, source),
            _ => self.engine.decide_move(&mut self.registry, source),
        };
        debug!(
            source = %source.display(),
            decision = %decision.classification,
            "decided"
        );

        let execution = self.executor.execute(&mut self.registry, &decision);
        self.summary.record(&execution);
        execution
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Replayer for an undo run.
pub fn undo_replayer(config: &OrgConfig) -> UndoReplayer {
    UndoReplayer::new(FsMover, config.commit)
}

/// Hasher selected by configuration.
pub fn build_hasher(config: &OrgConfig) -> Result<Box<dyn Hasher>, ConfigError> {
    match config.hash_command.as_deref() {
        Some(command) => {
            let hasher = CommandHasher::from_command_line(command).ok_or_else(|| {
                ConfigError::Invalid {
                    message: format!("Empty hash command '{command}'"),
                }
            })?;
            Ok(Box::new(hasher))
        }
        None => Ok(Box::new(Blake3Hasher::new())),
    }
}
