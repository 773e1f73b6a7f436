use thiserror::Error;

/// Strata error types
#[derive(Error, Debug)]
pub enum StrataError {
    /// A required record or blob does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-supplied option is out of range or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record with the same identity already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A collaborator returned internally inconsistent data
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Content store failure
    #[error("content store error: {0}")]
    Content(String),

    /// Snapshotter failure
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Image store failure
    #[error("image store error: {0}")]
    ImageStore(String),

    /// Diff service failure
    #[error("diff error: {0}")]
    Diff(String),

    /// Lease manager failure
    #[error("lease error: {0}")]
    Lease(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StrataError {
    /// True if this error signals a missing record or blob.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StrataError::NotFound(_))
    }

    /// True if this error signals an identity collision.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StrataError::AlreadyExists(_))
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

/// Result type alias for strata operations
pub type Result<T> = std::result::Result<T, StrataError>;
