use fsapi_types::{FieldError, Resource};

use crate::strategy::Strategy;

/// Full-object replace semantics.
///
/// The object to persist is whatever the caller submitted; the resource's
/// own `default_fields`/`validate` hooks run on it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultStrategy {
    allow_create_on_update: bool,
}

impl DefaultStrategy {
    pub fn new() -> Self {
        Self {
            allow_create_on_update: false,
        }
    }

    /// Let updates of absent objects create them.
    pub fn with_create_on_update(mut self) -> Self {
        self.allow_create_on_update = true;
        self
    }
}

impl<R: Resource> Strategy<R> for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn prepare_for_create(&self, _obj: &mut R) {}

    fn prepare_for_update(&self, _old: &R, _new: &mut R) {}

    fn validate(&self, obj: &R) -> Vec<FieldError> {
        obj.validate()
    }

    fn validate_update(&self, new: &R, old: &R) -> Vec<FieldError> {
        new.validate_update(old)
    }

    fn allow_create_on_update(&self) -> bool {
        self.allow_create_on_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsapi_types::{DynamicObject, ObjectMeta};
    use serde_json::json;

    #[test]
    fn update_is_full_replace() {
        let s = DefaultStrategy::new();
        let old = DynamicObject::new(ObjectMeta::named("a")).with_field("spec", json!(1));
        let mut new = DynamicObject::new(ObjectMeta::named("a")).with_field("spec", json!(2));
        Strategy::<DynamicObject>::prepare_for_update(&s, &old, &mut new);
        assert_eq!(new.fields["spec"], json!(2));
    }

    #[test]
    fn create_on_update_is_opt_in() {
        assert!(!Strategy::<DynamicObject>::allow_create_on_update(&DefaultStrategy::new()));
        assert!(!Strategy::<DynamicObject>::allow_create_on_update(
            &<DefaultStrategy as Default>::default()
        ));
        assert!(Strategy::<DynamicObject>::allow_create_on_update(
            &DefaultStrategy::new().with_create_on_update()
        ));
    }

    #[test]
    fn main_resource_has_no_subresource() {
        assert_eq!(Strategy::<DynamicObject>::subresource(&DefaultStrategy::new()), None);
    }
}
