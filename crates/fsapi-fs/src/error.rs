/// Errors from filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// No file exists at the key.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped to a path inside the root.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the host filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
