//! Watch hub for fsapi.
//!
//! Distributes committed changes to any number of watchers. Each watcher has
//! its own bounded queue and filter; a watcher that cannot keep up is
//! dropped rather than slowing the writer down. A bounded history of recent
//! events lets a watch resume from a version returned by a list.

pub mod error;
pub mod event;
pub mod hub;

pub use error::{WatchError, WatchResult};
pub use event::{EventType, WatchEvent};
pub use hub::{StopHandle, WatchConfig, WatchHub, Watcher};
pub use tokio::sync::mpsc::error::TryRecvError;
