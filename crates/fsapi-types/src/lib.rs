//! Foundation types for fsapi.
//!
//! Every other fsapi crate depends on `fsapi-types`. It defines what a stored
//! object looks like, without knowing where objects are stored.
//!
//! # Key Types
//!
//! - [`ObjectMeta`] -- name, namespace, version stamp, labels, finalizers
//! - [`Resource`] -- trait implemented by every storable kind
//! - [`StatusSubResource`] -- kinds whose status is updated independently
//! - [`DynamicObject`] -- untyped resource for tooling
//! - [`Selector`] / [`FieldSelector`] / [`ListOptions`] -- list and watch filters
//! - [`FieldError`] -- field-level validation failure

pub mod error;
pub mod meta;
pub mod resource;
pub mod selector;
pub mod validation;
pub mod version;

pub use error::{FieldError, FieldErrorKind, TypeError};
pub use meta::{GroupResource, ObjectMeta, TypeMeta};
pub use resource::{differs_only_in_mutable_metadata, DynamicObject, Resource, StatusSubResource};
pub use selector::{FieldSelector, ListOptions, Operator, Requirement, Selector};
pub use validation::{validate_labels, validate_object_meta, validate_object_name};
pub use version::{
    clear_resource_version, format_resource_version, get_resource_version,
    parse_resource_version, set_resource_version,
};
