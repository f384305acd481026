//! Key/value filesystem abstraction for fsapi.
//!
//! The object store never touches `std::fs` directly. It reads and writes
//! through the [`Filesystem`] trait, so the same store logic runs against
//! the host disk or against process memory.
//!
//! # Backends
//!
//! - [`RealFs`] -- one file per key below a root directory, atomic rename on write
//! - [`MemoryFs`] -- `BTreeMap`-based store for tests and ephemeral servers
//!
//! # Design Rules
//!
//! 1. Keys are relative `/`-separated paths and can never escape the root.
//! 2. Writes are create-or-replace and never expose a partial file.
//! 3. Absent keys are reported as [`FsError::NotFound`], never as I/O errors.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod real;
pub mod traits;

pub use error::{FsError, FsResult};
pub use memory::MemoryFs;
pub use real::RealFs;
pub use traits::{validate_key, Filesystem};
