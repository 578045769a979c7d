//! Error types for tree materialization.
//!
//! Every fallible step of the traversal returns [`MaterializeResult<T>`].
//! Each variant carries the path it failed on, so the message surfaced to
//! the user always names the entry.

use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

/// Kind of filesystem entry a tree requires or finds at a path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryKind {
    Directory,
    File,
    Other,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
            EntryKind::Other => "special file",
        }
    }

    pub fn of(metadata: &std::fs::Metadata) -> Self {
        if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// The computed path is not usable on this host (bad name, bad characters).
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: Utf8PathBuf, reason: String },

    /// The process may not create the entry.
    #[error("permission denied: {path}")]
    PermissionDenied { path: Utf8PathBuf },

    /// Something of the wrong kind already occupies the path.
    #[error("conflict at {path}: expected {expected}, found existing {found}")]
    Conflict {
        path: Utf8PathBuf,
        expected: EntryKind,
        found: EntryKind,
    },

    /// Any other I/O failure.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type MaterializeResult<T> = Result<T, MaterializeError>;

impl MaterializeError {
    pub fn invalid(path: &Utf8Path, reason: impl Into<String>) -> Self {
        MaterializeError::InvalidPath {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }

    /// Sort a raw I/O error into the taxonomy.
    pub fn from_io(path: &Utf8Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => MaterializeError::PermissionDenied {
                path: path.to_owned(),
            },
            io::ErrorKind::InvalidInput => MaterializeError::InvalidPath {
                path: path.to_owned(),
                reason: err.to_string(),
            },
            _ => MaterializeError::Io {
                path: path.to_owned(),
                source: err,
            },
        }
    }
}
