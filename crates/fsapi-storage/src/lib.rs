//! Versioned object store for fsapi.
//!
//! [`FileStore`] keeps the objects of one resource kind as JSON files on a
//! [`Filesystem`](fsapi_fs::Filesystem) and layers on top of them:
//!
//! - **Optimistic concurrency**: every committed mutation takes the next
//!   `resourceVersion` from a per-store counter, and writers that propose a
//!   stale version get a conflict.
//! - **Finalizers**: deleting an object with finalizers only marks it; it
//!   is removed once an update clears the last one.
//! - **Watches**: each commit publishes one event, and watchers can resume
//!   from the version a list returned without gaps or duplicates.
//!
//! Update policy comes from a [`Strategy`](fsapi_strategy::Strategy), so
//! one set of files can be served as a main resource and a `status`
//! sub-resource with different rules.

pub mod config;
pub mod context;
pub mod error;
pub mod options;
pub mod store;

pub use config::StoreConfig;
pub use context::Context;
pub use error::{CancelReason, StoreError, StoreResult};
pub use options::{DeleteOptions, ObjectList, Preconditions, UpdateInfo, ValidateObjectFn};
pub use store::FileStore;
