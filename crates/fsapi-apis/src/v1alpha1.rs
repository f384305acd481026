use fsapi_types::{FieldError, GroupResource, ObjectMeta, Resource, StatusSubResource, TypeMeta};
use serde::{Deserialize, Serialize};

/// API group of every kind in this module.
pub const GROUP: &str = "core.fsapi.dev";

pub const VERSION: &str = "v1alpha1";
pub const KIND: &str = "Manifest";
pub const RESOURCE: &str = "manifests";

/// Longest accepted `spec.message`.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// A named deployable unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ManifestSpec,
    #[serde(default)]
    pub status: ManifestStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Manifest {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            type_meta: Self::type_meta(),
            metadata,
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(ObjectMeta::named(name))
    }

    /// Builder-style `spec.message`.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.spec.message = message.into();
        self
    }

    /// Builder-style `status.message`.
    pub fn with_status_message(mut self, message: impl Into<String>) -> Self {
        self.status.message = message.into();
        self
    }

    pub fn type_meta() -> TypeMeta {
        TypeMeta::new(format!("{GROUP}/{VERSION}"), KIND)
    }

    pub fn group_resource() -> GroupResource {
        GroupResource::new(GROUP, RESOURCE, KIND)
    }
}

impl Resource for Manifest {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn default_fields(&mut self) {
        if self.type_meta.api_version.is_empty() || self.type_meta.kind.is_empty() {
            self.type_meta = Self::type_meta();
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errs = Vec::new();
        if self.spec.message.chars().count() > MAX_MESSAGE_LEN {
            errs.push(FieldError::too_long(
                "spec.message",
                format!("{}...", self.spec.message.chars().take(16).collect::<String>()),
                MAX_MESSAGE_LEN,
            ));
        }
        errs
    }
}

impl StatusSubResource for Manifest {
    fn copy_status_to(&self, target: &mut Self) {
        target.status = self.status.clone();
    }
}
