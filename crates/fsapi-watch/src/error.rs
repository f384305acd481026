/// Errors produced by the watch hub.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// The requested resume point is older than the retained history.
    #[error("too old resource version: {requested} (oldest resumable: {oldest_resumable})")]
    Expired { requested: u64, oldest_resumable: u64 },
}

/// Convenience alias used throughout the watch crate.
pub type WatchResult<T> = Result<T, WatchError>;
