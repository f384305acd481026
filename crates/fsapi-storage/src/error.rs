use fsapi_fs::FsError;
use fsapi_types::{FieldError, GroupResource, TypeError};
use fsapi_watch::WatchError;

/// Why a context stopped an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Canceled,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canceled => f.write_str("context canceled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Errors from object store operations.
///
/// Messages follow the wording API clients already know from Kubernetes,
/// e.g. `manifests.core.fsapi.dev "web" not found`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object with the given name.
    #[error("{resource} {name:?} not found")]
    NotFound { resource: String, name: String },

    /// Create of a name that is already taken.
    #[error("{resource} {name:?} already exists")]
    AlreadyExists { resource: String, name: String },

    /// A version or uid precondition did not hold.
    #[error("Operation cannot be fulfilled on {resource} {name:?}: {reason}")]
    Conflict {
        resource: String,
        name: String,
        reason: String,
    },

    /// The object failed validation.
    #[error("{kind} {name:?} is invalid: {}", join_field_errors(.errors))]
    Invalid {
        kind: String,
        name: String,
        errors: Vec<FieldError>,
    },

    /// A watch asked to resume from a version no longer retained.
    #[error("too old resource version: {requested} ({oldest_resumable})")]
    Expired { requested: u64, oldest_resumable: u64 },

    /// A watch asked to resume from a version the store has not reached.
    #[error("Too large resource version: {requested}, current: {current}")]
    TooLargeResourceVersion { requested: u64, current: u64 },

    /// The caller's context was canceled or its deadline passed.
    #[error("{0}")]
    Canceled(CancelReason),

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem failure or undecodable stored data.
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    match errors {
        [one] => one.to_string(),
        many => format!(
            "[{}]",
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// The message used when a caller's version is stale.
pub(crate) const MODIFIED_REASON: &str =
    "the object has been modified; please apply your changes to the latest version and try again";

impl StoreError {
    pub fn not_found(resource: &GroupResource, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            name: name.into(),
        }
    }

    pub fn already_exists(resource: &GroupResource, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.to_string(),
            name: name.into(),
        }
    }

    pub fn conflict(
        resource: &GroupResource,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            resource: resource.to_string(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(resource: &GroupResource, name: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Invalid {
            kind: resource.kind.clone(),
            name: name.into(),
            errors,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    pub fn is_too_large_resource_version(&self) -> bool {
        matches!(self, Self::TooLargeResourceVersion { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }

    /// HTTP-style status code for this error.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } | Self::Conflict { .. } => 409,
            Self::Invalid { .. } => 422,
            Self::Expired { .. } => 410,
            Self::Canceled(CancelReason::Canceled) => 499,
            Self::TooLargeResourceVersion { .. } | Self::Canceled(CancelReason::DeadlineExceeded) => 504,
            Self::Config(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<FsError> for StoreError {
    fn from(e: FsError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {e}"))
    }
}

impl From<WatchError> for StoreError {
    fn from(e: WatchError) -> Self {
        match e {
            WatchError::Expired {
                requested,
                oldest_resumable,
            } => Self::Expired {
                requested,
                oldest_resumable,
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn manifests() -> GroupResource {
        GroupResource::new("core.fsapi.dev", "manifests", "Manifest")
    }

    #[test]
    fn kubernetes_style_messages() {
        let gr = manifests();
        assert_eq!(
            StoreError::not_found(&gr, "web").to_string(),
            "manifests.core.fsapi.dev \"web\" not found"
        );
        assert_eq!(
            StoreError::conflict(&gr, "web", MODIFIED_REASON).to_string(),
            "Operation cannot be fulfilled on manifests.core.fsapi.dev \"web\": the object has been \
             modified; please apply your changes to the latest version and try again"
        );
    }

    #[test]
    fn invalid_lists_field_errors() {
        let gr = manifests();
        let one = StoreError::invalid(&gr, "x", vec![FieldError::required("metadata.name", "")]);
        assert_eq!(one.to_string(), "Manifest \"x\" is invalid: metadata.name: Required value");

        let two = StoreError::invalid(
            &gr,
            "x",
            vec![
                FieldError::required("metadata.name", ""),
                FieldError::forbidden("metadata.finalizers", "no"),
            ],
        );
        assert!(two.to_string().contains("[metadata.name: Required value, "));
    }

    #[test]
    fn codes_and_predicates() {
        let gr = manifests();
        assert_eq!(StoreError::not_found(&gr, "a").code(), 404);
        assert_eq!(StoreError::already_exists(&gr, "a").code(), 409);
        assert_eq!(StoreError::conflict(&gr, "a", "r").code(), 409);
        assert_eq!(StoreError::invalid(&gr, "a", vec![]).code(), 422);
        assert_eq!(StoreError::Canceled(CancelReason::DeadlineExceeded).code(), 504);
        let too_large = StoreError::TooLargeResourceVersion {
            requested: 100,
            current: 1,
        };
        assert_eq!(too_large.code(), 504);
        assert_eq!(too_large.to_string(), "Too large resource version: 100, current: 1");
        assert!(StoreError::already_exists(&gr, "a").is_already_exists());
        assert!(!StoreError::already_exists(&gr, "a").is_conflict());
    }

    #[test]
    fn watch_expiry_converts() {
        let e: StoreError = WatchError::Expired {
            requested: 3,
            oldest_resumable: 10,
        }
        .into();
        assert!(e.is_expired());
        assert_eq!(e.code(), 410);
    }
}
