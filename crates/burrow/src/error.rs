use burrow_source::SourceError;
use thiserror::Error;

/// Errors returned by [`ConfigManager`](crate::ConfigManager) operations
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store API is disabled")]
    StoreDisabled,

    /// The change was committed but the engine did not accept it
    #[error("apply config failed: {0}")]
    ApplyConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ManagerError {
    pub fn invalid(err: impl ToString) -> Self {
        Self::InvalidArgument(err.to_string())
    }

    /// HTTP status an API transport should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::NotFound(_) | Self::StoreDisabled => 404,
            Self::Conflict(_) => 409,
            Self::ApplyConfig(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<SourceError> for ManagerError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidArgument(_) => Self::InvalidArgument(err.to_string()),
            SourceError::AlreadyExists { .. } | SourceError::Conflict { .. } => {
                Self::Conflict(err.to_string())
            }
            SourceError::NotFound { .. } => Self::NotFound(err.to_string()),
            SourceError::Read { .. }
            | SourceError::Write { .. }
            | SourceError::Decode { .. }
            | SourceError::InvalidFile { .. }
            | SourceError::Encode(_) => Self::Internal(err.to_string()),
        }
    }
}
