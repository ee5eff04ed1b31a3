use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while decoding configuration documents
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `type` field is missing or empty
    #[error("{kind} type is empty")]
    EmptyType { kind: &'static str },

    /// The `type` field names a variant this build does not know
    #[error("unknown {kind} type: {tag}")]
    UnknownType { kind: &'static str, tag: String },

    /// Strict decoding found fields no variant claims
    #[error("unknown fields in {kind} config: {}", .fields.join(", "))]
    UnknownFields {
        kind: &'static str,
        fields: Vec<String>,
    },

    /// A tagged document was not a JSON object
    #[error("{kind} config must be an object")]
    NotAnObject { kind: &'static str },

    /// A `proxies` / `visitors` member that is not a list
    #[error("{kind} entries must be a list")]
    NotAList { kind: &'static str },

    /// Error in one entry of a `proxies` / `visitors` list
    #[error("{kind} #{index}: {source}")]
    Entry {
        kind: &'static str,
        index: usize,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config file could not be read
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn entry(kind: &'static str, index: usize, source: ConfigError) -> Self {
        Self::Entry {
            kind,
            index,
            source: Box::new(source),
        }
    }
}
