//! Per-request context: target namespace plus cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{CancelReason, StoreError, StoreResult};

/// Carries the request namespace and a cancellation signal into store
/// operations.
///
/// Clones share the cancellation flag, so canceling any clone cancels them
/// all. The store checks the context before and after taking its mutation
/// lock; an operation canceled at either point has no side effects.
#[derive(Clone, Debug, Default)]
pub struct Context {
    namespace: Option<String>,
    deadline: Option<Instant>,
    canceled: Arc<AtomicBool>,
}

impl Context {
    /// A context that is never canceled and targets cluster-scoped objects.
    pub fn background() -> Self {
        Self::default()
    }

    /// Scope the request to a namespace. An empty string means none.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Fail if the context was canceled or its deadline has passed.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_canceled() {
            return Err(StoreError::Canceled(CancelReason::Canceled));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(StoreError::Canceled(CancelReason::DeadlineExceeded))
            }
            _ => Ok(()),
        }
    }
}
