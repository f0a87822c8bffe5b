//! Physical filesystem primitives.

use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::Path;

use tracing::{debug, warn};

use crate::OpError;

/// Filesystem effects the executor and undo replayer rely on.
///
/// None of the operations may overwrite an existing destination.
pub trait Mover {
    /// Create `dir` and any missing ancestors. Existing directories are fine.
    fn create_dirs(&self, dir: &Path) -> Result<(), OpError>;

    /// Move a file, across volumes if needed. Returns bytes moved.
    fn move_file(&self, from: &Path, to: &Path) -> Result<u64, OpError>;

    /// Copy a file. Returns bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, OpError>;

    /// Delete a file.
    fn delete_file(&self, path: &Path) -> Result<(), OpError>;
}

/// [`Mover`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl Mover for FsMover {
    fn create_dirs(&self, dir: &Path) -> Result<(), OpError> {
        if dir.as_os_str().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|source| OpError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<u64, OpError> {
        if to.exists() {
            return Err(OpError::TargetExists {
                path: to.to_path_buf(),
            });
        }

        let size = fs::metadata(from).map(|m| m.len()).unwrap_or(0);

        // Copying is only needed when rename cannot cross a filesystem boundary.
        match fs::rename(from, to) {
            Ok(()) => Ok(size),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
                copy_then_remove(from, to)
            }
            Err(e) => Err(OpError::Move {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, OpError> {
        if to.exists() {
            return Err(OpError::TargetExists {
                path: to.to_path_buf(),
            });
        }

        discard_partial(to, copy_preserving_mtime(from, to)).map_err(|source| OpError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
    }

    fn delete_file(&self, path: &Path) -> Result<(), OpError> {
        fs::remove_file(path).map_err(|source| OpError::Delete {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Move by copy and delete, for renames across filesystems.
///
/// On failure the source stays in place and no copy is left at `to`.
fn copy_then_remove(from: &Path, to: &Path) -> Result<u64, OpError> {
    let move_err = |message: String| OpError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        message,
    };

    let bytes = discard_partial(to, copy_preserving_mtime(from, to))
        .map_err(|e| move_err(format!("Failed to copy: {e}")))?;
    discard_partial(to, fs::remove_file(from))
        .map_err(|e| move_err(format!("Failed to remove source: {e}")))?;
    Ok(bytes)
}

/// Pass `result` through, removing `to` when it is an error.
fn discard_partial<T>(to: &Path, result: io::Result<T>) -> io::Result<T> {
    if result.is_err()
        && let Err(e) = fs::remove_file(to)
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %to.display(), error = %e, "failed to remove partial copy");
    }
    result
}

/// Copy a file and carry its modification time over.
///
/// The date heuristic falls back to mtime, so a copied file must keep it.
fn copy_preserving_mtime(from: &Path, to: &Path) -> io::Result<u64> {
    let bytes = fs::copy(from, to)?;
    let modified = fs::metadata(from)?.modified()?;
    File::options().write(true).open(to)?.set_modified(modified)?;
    Ok(bytes)
}
