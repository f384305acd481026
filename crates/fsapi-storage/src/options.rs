use fsapi_types::{GroupResource, Resource};

use crate::error::{StoreError, StoreResult, MODIFIED_REASON};

/// Extra validation a caller runs on an object just before it is written.
pub type ValidateObjectFn<R> = dyn Fn(&R) -> StoreResult<()> + Send + Sync;

/// Conditions the stored object must satisfy for an update or delete to
/// proceed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub uid: Option<String>,
    pub resource_version: Option<String>,
}

impl Preconditions {
    pub fn uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            resource_version: None,
        }
    }

    pub fn resource_version(version: impl Into<String>) -> Self {
        Self {
            uid: None,
            resource_version: Some(version.into()),
        }
    }

    pub(crate) fn check<R: Resource>(&self, resource: &GroupResource, obj: &R) -> StoreResult<()> {
        let meta = obj.metadata();
        if let Some(uid) = &self.uid {
            if *uid != meta.uid {
                return Err(StoreError::conflict(
                    resource,
                    &meta.name,
                    format!(
                        "Precondition failed: UID in precondition: {uid}, UID in object meta: {}",
                        meta.uid
                    ),
                ));
            }
        }
        if let Some(version) = &self.resource_version {
            if *version != meta.resource_version {
                return Err(StoreError::conflict(resource, &meta.name, MODIFIED_REASON));
            }
        }
        Ok(())
    }
}

pub(crate) enum UpdateAction<R> {
    Modify(Box<dyn FnOnce(R) -> StoreResult<R> + Send>),
    Replace(R),
}

/// How an update computes the new object.
///
/// [`UpdateInfo::new`] wraps a function from the current stored object to
/// the desired one; it runs under the store's mutation lock. If the
/// returned object carries a non-empty `resourceVersion` that differs from
/// the stored one the update fails with a conflict, so callers that want
/// optimistic concurrency leave the version the function was handed in
/// place, and callers that want last-writer-wins clear it.
///
/// [`UpdateInfo::replace`] supplies the whole object up front. Only a
/// replace can create a missing object, and only when the store's strategy
/// allows create-on-update and the caller forces it.
pub struct UpdateInfo<R> {
    pub(crate) action: UpdateAction<R>,
    pub(crate) preconditions: Option<Preconditions>,
}

impl<R: Resource> UpdateInfo<R> {
    pub fn new<F>(update: F) -> Self
    where
        F: FnOnce(R) -> StoreResult<R> + Send + 'static,
    {
        Self {
            action: UpdateAction::Modify(Box::new(update)),
            preconditions: None,
        }
    }

    pub fn replace(obj: R) -> Self {
        Self {
            action: UpdateAction::Replace(obj),
            preconditions: None,
        }
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = Some(preconditions);
        self
    }

    pub fn preconditions(&self) -> Option<&Preconditions> {
        self.preconditions.as_ref()
    }
}

impl<R> std::fmt::Debug for UpdateInfo<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self.action {
            UpdateAction::Modify(_) => "modify",
            UpdateAction::Replace(_) => "replace",
        };
        f.debug_struct("UpdateInfo")
            .field("action", &action)
            .field("preconditions", &self.preconditions)
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub preconditions: Option<Preconditions>,
}

impl DeleteOptions {
    pub fn with_preconditions(preconditions: Preconditions) -> Self {
        Self {
            preconditions: Some(preconditions),
        }
    }
}

/// Result of a list: the matching objects and the store version they
/// reflect. Passing that version to a watch resumes exactly after the list.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectList<R> {
    pub resource_version: String,
    pub items: Vec<R>,
}

impl<R> ObjectList<R> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
