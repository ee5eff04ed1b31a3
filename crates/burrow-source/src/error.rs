use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which collection an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Proxy,
    Visitor,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy => f.write_str("proxy"),
            Self::Visitor => f.write_str("visitor"),
        }
    }
}

/// Errors raised by config sources
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request itself is malformed (empty or duplicate names)
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: EntryKind, name: String },

    #[error("{kind} {name:?} not found")]
    NotFound { kind: EntryKind, name: String },

    /// The same name is defined by more than one source
    #[error("{kind} {name:?} is defined by more than one source")]
    Conflict { kind: EntryKind, name: String },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file decoded but holds empty or repeated names
    #[error("invalid entries in '{path}': {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("failed to encode store: {0}")]
    Encode(#[source] serde_json::Error),
}

impl SourceError {
    pub fn already_exists(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn not_found(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn conflict(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
        }
    }
}
