//! Content hashing strategies.
//!
//! The registry only needs `path -> digest`; how the digest is produced is
//! pluggable. [`Blake3Hasher`] streams the file through BLAKE3 in-process,
//! [`CommandHasher`] pipes the file into an external program such as
//! `sha1sum` and keeps the first token it prints.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use orgfile_core::Digest;

/// Errors produced while computing a digest.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external hashing command failed.
    #[error("Hash command failed for {path}: {message}")]
    Command { path: PathBuf, message: String },
}

/// Computes a content digest for a path.
///
/// Implementations must be a pure function of the file's bytes.
pub trait Hasher {
    fn hash(&self, path: &Path) -> Result<Digest, HashError>;
}

/// Streaming BLAKE3 hasher.
#[derive(Debug, Clone)]
pub struct Blake3Hasher {
    buffer_size: usize,
}

impl Default for Blake3Hasher {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
        }
    }
}

impl Blake3Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Hasher for Blake3Hasher {
    fn hash(&self, path: &Path) -> Result<Digest, HashError> {
        let io_err = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = file.read(&mut buffer).map_err(io_err)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Digest::new(hasher.finalize().to_hex().as_str()))
    }
}

/// Hashes by running an external command with the file on stdin.
#[derive(Debug, Clone)]
pub struct CommandHasher {
    program: String,
    args: Vec<String>,
}

impl CommandHasher {
    /// Build from a command line such as `sha1sum` or `openssl dgst -r -sha256`.
    ///
    /// Returns `None` for an empty command line.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Hasher for CommandHasher {
    fn hash(&self, path: &Path) -> Result<Digest, HashError> {
        let input = File::open(path).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::from(input))
            .stderr(Stdio::null())
            .output()
            .map_err(|e| HashError::Command {
                path: path.to_path_buf(),
                message: format!("could not run '{}': {e}", self.program),
            })?;

        if !output.status.success() {
            return Err(HashError::Command {
                path: path.to_path_buf(),
                message: format!("'{}' exited with {}", self.program, output.status),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.split_whitespace().next() {
            Some(token) => Ok(Digest::new(token)),
            None => Err(HashError::Command {
                path: path.to_path_buf(),
                message: format!("'{}' produced no output", self.program),
            }),
        }
    }
}

impl<H: Hasher + ?Sized> Hasher for Box<H> {
    fn hash(&self, path: &Path) -> Result<Digest, HashError> {
        (**self).hash(path)
    }
}
