//! The [`Resource`] trait every stored kind implements, plus
//! [`DynamicObject`], an untyped resource for tooling.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldError, TypeError};
use crate::meta::ObjectMeta;

/// A typed application object that can be persisted by the store.
///
/// Implementations expose their metadata and may hook defaulting and
/// validation. The store treats everything outside the metadata as opaque
/// payload.
pub trait Resource:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Fill derived or defaulted fields in place.
    fn default_fields(&mut self) {}

    /// Check the object, returning one entry per invalid field.
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }

    /// Check an update against the previously stored object.
    fn validate_update(&self, _old: &Self) -> Vec<FieldError> {
        self.validate()
    }
}

/// A resource whose `status` can be written independently of the rest.
pub trait StatusSubResource: Resource {
    /// Copy this object's status onto `target`, leaving every other field of
    /// `target` untouched.
    fn copy_status_to(&self, target: &mut Self);
}

/// Returns `true` when `a` and `b` differ at most in the metadata fields a
/// terminating object may still change (finalizers, labels, annotations)
/// and in their version stamps.
pub fn differs_only_in_mutable_metadata<R: Resource>(a: &R, b: &R) -> Result<bool, TypeError> {
    Ok(normalized(a)? == normalized(b)?)
}

fn normalized<R: Resource>(obj: &R) -> Result<Value, TypeError> {
    let mut obj = obj.clone();
    let meta = obj.metadata_mut();
    meta.finalizers.clear();
    meta.labels.clear();
    meta.annotations.clear();
    meta.resource_version.clear();
    Ok(serde_json::to_value(&obj)?)
}

/// An untyped object: metadata plus an arbitrary JSON body.
///
/// Every top-level key other than `metadata` (including `apiVersion`,
/// `kind`, `spec`, and `status`) lives in `fields`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DynamicObject {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            fields: Map::new(),
        }
    }

    /// Builder-style top-level field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, TypeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Resource for DynamicObject {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl StatusSubResource for DynamicObject {
    fn copy_status_to(&self, target: &mut Self) {
        match self.fields.get("status") {
            Some(status) => {
                target.fields.insert("status".into(), status.clone());
            }
            None => {
                target.fields.remove("status");
            }
        }
    }
}
