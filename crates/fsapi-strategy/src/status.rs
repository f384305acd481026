//! Strategies for kinds whose `status` is written independently of the
//! rest of the object.
//!
//! A kind with a status sub-resource is served by two strategies over the
//! same store: [`PreserveStatusStrategy`] for the main resource, which
//! ignores status changes, and [`StatusSubResourceStrategy`] for the
//! `status` endpoint, which ignores everything except status.

use fsapi_types::{FieldError, StatusSubResource};
use tracing::trace;

use crate::strategy::Strategy;

/// Update policy for the `status` sub-resource.
///
/// On update, only the status of the caller's object is copied onto the
/// stored object; every other field, metadata included, is kept verbatim
/// from the stored version.
#[derive(Clone, Debug, Default)]
pub struct StatusSubResourceStrategy<S> {
    inner: S,
}

impl<S> StatusSubResourceStrategy<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<R, S> Strategy<R> for StatusSubResourceStrategy<S>
where
    R: StatusSubResource,
    S: Strategy<R>,
{
    fn name(&self) -> &str {
        "status"
    }

    fn prepare_for_create(&self, obj: &mut R) {
        self.inner.prepare_for_create(obj);
    }

    fn prepare_for_update(&self, old: &R, new: &mut R) {
        let mut merged = old.clone();
        new.copy_status_to(&mut merged);
        trace!(name = %old.metadata().name, "status update merged onto stored object");
        *new = merged;
    }

    fn default(&self, obj: &mut R) {
        self.inner.default(obj);
    }

    fn validate(&self, obj: &R) -> Vec<FieldError> {
        self.inner.validate(obj)
    }

    fn validate_update(&self, new: &R, old: &R) -> Vec<FieldError> {
        self.inner.validate_update(new, old)
    }

    fn allow_create_on_update(&self) -> bool {
        false
    }

    fn subresource(&self) -> Option<&str> {
        Some("status")
    }
}

/// Update policy for the main resource of a kind with a status
/// sub-resource: the stored status always wins over the caller's.
#[derive(Clone, Debug, Default)]
pub struct PreserveStatusStrategy<S> {
    inner: S,
}

impl<S> PreserveStatusStrategy<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<R, S> Strategy<R> for PreserveStatusStrategy<S>
where
    R: StatusSubResource,
    S: Strategy<R>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn prepare_for_create(&self, obj: &mut R) {
        self.inner.prepare_for_create(obj);
    }

    fn prepare_for_update(&self, old: &R, new: &mut R) {
        self.inner.prepare_for_update(old, new);
        old.copy_status_to(new);
    }

    fn default(&self, obj: &mut R) {
        self.inner.default(obj);
    }

    fn validate(&self, obj: &R) -> Vec<FieldError> {
        self.inner.validate(obj)
    }

    fn validate_update(&self, new: &R, old: &R) -> Vec<FieldError> {
        self.inner.validate_update(new, old)
    }

    fn allow_create_on_update(&self) -> bool {
        self.inner.allow_create_on_update()
    }
}
