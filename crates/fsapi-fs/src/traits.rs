use crate::error::{FsError, FsResult};

/// A flat namespace of byte blobs addressed by `/`-separated keys.
///
/// All implementations must satisfy these invariants:
/// - `write` is create-or-replace and atomic from the caller's point of view:
///   a concurrent `read` sees either the old bytes or the new bytes, never a
///   mix.
/// - `read` and `delete` of an absent key return [`FsError::NotFound`].
/// - `list` returns keys in ascending order.
/// - Keys are relative: no leading `/`, no empty, `.` or `..` components.
pub trait Filesystem: Send + Sync {
    /// Read the bytes stored at `key`.
    fn read(&self, key: &str) -> FsResult<Vec<u8>>;

    /// Store `data` at `key`, replacing anything already there.
    fn write(&self, key: &str, data: &[u8]) -> FsResult<()>;

    /// Remove the file at `key`.
    fn delete(&self, key: &str) -> FsResult<()>;

    /// All keys starting with `prefix`, sorted.
    ///
    /// Pass `""` to list everything. Pass `"manifests/"` for one directory
    /// and everything beneath it.
    fn list(&self, prefix: &str) -> FsResult<Vec<String>>;

    /// Check whether a file exists at `key`.
    fn exists(&self, key: &str) -> FsResult<bool> {
        match self.read(key) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Reject keys that would escape the root or collide with directory syntax.
pub fn validate_key(key: &str) -> FsResult<()> {
    let invalid = |reason: &str| FsError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid("key contains a forbidden character"));
    }
    for component in key.split('/') {
        match component {
            "" => return Err(invalid("key components must not be empty")),
            "." | ".." => return Err(invalid("key components must not be '.' or '..'")),
            _ => {}
        }
    }
    Ok(())
}
