use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A directory or entry could not be read while walking the tree.
#[derive(Debug, Error)]
#[error("cannot scan {}: {message}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

/// A single file could not be hashed. The file is left out of this run.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("file vanished before it could be hashed: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O failure on `path`, separating files that disappeared
    /// from files that could not be read.
    pub fn from_io(path: &std::path::Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            HashError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            HashError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// The persistent hash store failed. Always fatal for the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database handle poisoned by a panicked worker")]
    Poisoned,

    #[error("invalid record for {path}: {message}")]
    InvalidRecord { path: String, message: String },

    #[error("existing files table has unexpected columns ({columns})")]
    UnknownSchema { columns: String },
}

/// Replacing one duplicate with a symlink failed. The candidate is left as it was.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{} is not a regular file", path.display())]
    NotRegularFile { path: PathBuf },

    #[error("canonical file {} is gone", path.display())]
    CanonicalMissing { path: PathBuf },

    #[error("cannot inspect {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot link {} -> {}: {source}", path.display(), target.display())]
    Symlink {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot replace {}: {source}", path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-kind tally of the non-fatal errors seen during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    pub scan: usize,
    pub hash: usize,
    pub link: usize,
}

impl ErrorCounts {
    pub fn total(&self) -> usize {
        self.scan + self.hash + self.link
    }
}
