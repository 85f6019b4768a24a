use std::path::PathBuf;

/// Errors from artifact store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No committed artifact has this name.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// The name is already committed or currently being staged.
    #[error("artifact already exists: {0}")]
    AlreadyExists(String),

    /// The name is not a bare filename.
    #[error("invalid artifact name: {0:?}")]
    InvalidName(String),

    /// A configured storage directory is missing or unusable.
    #[error("unusable storage directory {path}: {reason}")]
    BadDirectory { path: PathBuf, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
