use fsapi_types::{FieldError, Resource};

/// Policy the object store consults on every create and update.
///
/// The store calls the hooks in a fixed order. For a create it runs
/// `prepare_for_create`, `default`, then `validate`. For an update it runs
/// `prepare_for_update`, `default`, then `validate_update`. Any returned
/// [`FieldError`] rejects the mutation before anything is written.
///
/// The trait is object-safe and `Send + Sync` so a store can hold an
/// `Arc<dyn Strategy<R>>`.
pub trait Strategy<R: Resource>: Send + Sync {
    /// Human-readable name (e.g. "default", "status").
    fn name(&self) -> &str;

    /// Normalize a new object before it is first stored.
    fn prepare_for_create(&self, obj: &mut R);

    /// Merge the caller's object with the stored one. `new` holds the
    /// caller's object on entry and the object to persist on return.
    fn prepare_for_update(&self, old: &R, new: &mut R);

    /// Fill defaulted or derived fields in place.
    fn default(&self, obj: &mut R) {
        obj.default_fields();
    }

    fn validate(&self, obj: &R) -> Vec<FieldError>;

    fn validate_update(&self, new: &R, old: &R) -> Vec<FieldError>;

    /// Whether an update of an absent object may create it.
    fn allow_create_on_update(&self) -> bool;

    /// The sub-resource this strategy writes, if it is not the main resource.
    fn subresource(&self) -> Option<&str> {
        None
    }
}
