//! Object metadata shared by every stored resource.
//!
//! Field names serialize in camelCase so files on disk look like the
//! Kubernetes objects API clients expect.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `apiVersion` and `kind`, carried inline by typed objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl TypeMeta {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

/// Standard object metadata.
///
/// The store owns `uid`, `resource_version`, `creation_timestamp`,
/// `deletion_timestamp`, and `deletion_grace_period_seconds`; values a
/// caller supplies for them are overwritten or ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// Opaque version stamp, a decimal `u64`. Empty means "not yet stored".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Set when a delete was requested but finalizers are still pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

impl ObjectMeta {
    /// Metadata carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style label insertion.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Builder-style finalizer insertion.
    pub fn with_finalizer(mut self, finalizer: impl Into<String>) -> Self {
        self.finalizers.push(finalizer.into());
        self
    }

    /// Returns `true` once a delete has been requested for this object.
    pub fn is_deletion_marked(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Returns `true` if the given finalizer is attached.
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Remove a finalizer, returning `true` if it was present.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }

    /// `namespace/name`, or just `name` for cluster-scoped objects.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }
}

/// Identifies a resource kind within an API group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    /// API group, empty for the core group.
    pub group: String,
    /// Lower-case plural resource name, e.g. `manifests`. Also the
    /// directory name objects of this kind are stored under.
    pub resource: String,
    /// Singular type name, e.g. `Manifest`.
    pub kind: String,
}

impl GroupResource {
    pub fn new(
        group: impl Into<String>,
        resource: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    /// `resource.group`, the form used in API error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted() {
        let meta = ObjectMeta::named("x");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "x" }));
    }

    #[test]
    fn camel_case_field_names() {
        let mut meta = ObjectMeta::named("x");
        meta.resource_version = "7".into();
        meta.deletion_grace_period_seconds = Some(0);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["resourceVersion"], "7");
        assert_eq!(json["deletionGracePeriodSeconds"], 0);
    }

    #[test]
    fn finalizer_helpers() {
        let mut meta = ObjectMeta::named("x").with_finalizer("a").with_finalizer("b");
        assert!(meta.has_finalizer("a"));
        assert!(meta.remove_finalizer("a"));
        assert!(!meta.remove_finalizer("a"));
        assert_eq!(meta.finalizers, vec!["b".to_string()]);
    }

    #[test]
    fn key_includes_namespace() {
        let mut meta = ObjectMeta::named("x");
        assert_eq!(meta.key(), "x");
        meta.namespace = "team".into();
        assert_eq!(meta.key(), "team/x");
    }

    #[test]
    fn group_resource_display() {
        assert_eq!(
            GroupResource::new("core.fsapi.dev", "manifests", "Manifest").to_string(),
            "manifests.core.fsapi.dev"
        );
        assert_eq!(GroupResource::new("", "things", "Thing").to_string(), "things");
    }
}
