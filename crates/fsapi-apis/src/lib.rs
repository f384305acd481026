//! Built-in resource kinds served by fsapi.
//!
//! - [`v1alpha1::Manifest`] -- `manifests.core.fsapi.dev`, with a status sub-resource

pub mod v1alpha1;

pub use crate::v1alpha1::{Manifest, ManifestSpec, ManifestStatus};
