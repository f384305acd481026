//! Create and update policies for fsapi resource kinds.
//!
//! A [`Strategy`] decides what an update is allowed to change and runs
//! defaulting and validation. The object store holds one strategy per
//! endpoint and never inspects payloads itself.
//!
//! # Strategies
//!
//! - [`DefaultStrategy`] -- full-object replace, resource hooks for defaults and validation
//! - [`StatusSubResourceStrategy`] -- writes only `status`, keeps everything else
//! - [`PreserveStatusStrategy`] -- main-resource writes that never touch `status`

pub mod default;
pub mod status;
pub mod strategy;

pub use default::DefaultStrategy;
pub use status::{PreserveStatusStrategy, StatusSubResourceStrategy};
pub use strategy::Strategy;
