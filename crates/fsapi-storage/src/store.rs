use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use fsapi_fs::Filesystem;
use fsapi_strategy::Strategy;
use fsapi_types::{
    differs_only_in_mutable_metadata, format_resource_version, get_resource_version,
    parse_resource_version, set_resource_version, validate_object_meta, validate_object_name,
    FieldError, GroupResource, ListOptions, Resource,
};
use fsapi_watch::{WatchEvent, WatchHub, Watcher};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::context::Context;
use crate::error::{StoreError, StoreResult, MODIFIED_REASON};
use crate::options::{DeleteOptions, ObjectList, UpdateAction, UpdateInfo, ValidateObjectFn};

/// Extension of every object file.
const OBJECT_SUFFIX: &str = ".json";

/// File below the resource directory holding the version of the latest
/// delete, which no object file records. `%` never appears in object or
/// namespace names, so it cannot collide with them.
const VERSION_MARKER: &str = "%version";

/// Guarded by the mutation lock.
struct StoreState {
    /// Last version handed out. Only advanced after a mutation committed.
    version: u64,
}

struct Shared<R> {
    resource: GroupResource,
    fs: Arc<dyn Filesystem>,
    hub: WatchHub<R>,
    config: StoreConfig,
    /// Writers hold it to mutate and publish; list and watch hold it shared
    /// so they observe a state between mutations.
    state: RwLock<StoreState>,
}

/// Versioned object store for one resource kind.
///
/// Every object is a pretty-printed JSON file at
/// `<resource>/<name>.json`, or `<resource>/<namespace>/<name>.json` for
/// namespaced objects. Each committed mutation takes the next value of a
/// single counter as the object's `resourceVersion` and publishes exactly
/// one event to the store's [`WatchHub`], in commit order.
///
/// Clones and [`FileStore::with_strategy`] views share the files, counter,
/// lock, and watchers; only the update policy differs between views.
pub struct FileStore<R: Resource> {
    shared: Arc<Shared<R>>,
    strategy: Arc<dyn Strategy<R>>,
}

impl<R: Resource> Clone for FileStore<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<R: Resource> FileStore<R> {
    /// Open the store for `resource`, recovering the version counter from
    /// the highest `resourceVersion` found on disk.
    ///
    /// Files that do not decode are logged and skipped.
    pub fn open(
        fs: Arc<dyn Filesystem>,
        resource: GroupResource,
        strategy: Arc<dyn Strategy<R>>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let mut version = 0;
        let mut objects = 0usize;
        for key in fs.list(&format!("{}/", resource.resource))? {
            if !key.ends_with(OBJECT_SUFFIX) {
                continue;
            }
            let bytes = match fs.read(&key) {
                Ok(bytes) => bytes,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            let stored = serde_json::from_slice::<R>(&bytes)
                .map_err(StoreError::from)
                .and_then(|obj| Ok(get_resource_version(&obj)?));
            match stored {
                Ok(v) => {
                    version = version.max(v);
                    objects += 1;
                }
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable object file"),
            }
        }

        let marker = format!("{}/{VERSION_MARKER}", resource.resource);
        match fs.read(&marker) {
            Ok(bytes) => match std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| parse_resource_version(s.trim()).ok())
            {
                Some(v) => version = version.max(v),
                None => warn!(key = %marker, "ignoring unreadable version marker"),
            },
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        info!(resource = %resource, objects, version, "object store opened");

        Ok(Self {
            shared: Arc::new(Shared {
                hub: WatchHub::starting_at(config.watch.clone(), version),
                resource,
                fs,
                config,
                state: RwLock::new(StoreState { version }),
            }),
            strategy,
        })
    }

    /// A view of the same objects that applies `strategy` instead, e.g. the
    /// `status` sub-resource of a kind.
    pub fn with_strategy(&self, strategy: Arc<dyn Strategy<R>>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            strategy,
        }
    }

    pub fn resource(&self) -> &GroupResource {
        &self.shared.resource
    }

    pub fn strategy(&self) -> &dyn Strategy<R> {
        self.strategy.as_ref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// The hub carrying this store's change events.
    pub fn hub(&self) -> &WatchHub<R> {
        &self.shared.hub
    }

    /// Version of the most recent committed mutation, `0` if none.
    pub fn current_version(&self) -> u64 {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Store a new object.
    ///
    /// The store assigns `uid`, `creationTimestamp`, and `resourceVersion`,
    /// runs the strategy's create hooks and then `validate`, the caller's
    /// last check before anything is written.
    pub fn create(
        &self,
        ctx: &Context,
        obj: R,
        validate: Option<&ValidateObjectFn<R>>,
    ) -> StoreResult<R> {
        ctx.check()?;
        let obj = self.prepare_new(ctx, obj)?;
        if let Some(validate) = validate {
            validate(&obj)?;
        }

        let mut state = self.lock_for_mutation(ctx)?;
        let key = self.object_key(ctx, &obj.metadata().name)?;
        if self.read_object(&key)?.is_some() {
            return Err(StoreError::already_exists(
                &self.shared.resource,
                &obj.metadata().name,
            ));
        }
        let created = self.commit_write(&mut state, &key, obj, WatchEvent::added)?;
        debug!(
            resource = %self.shared.resource,
            name = %created.metadata().key(),
            version = %created.metadata().resource_version,
            "object created"
        );
        Ok(created)
    }

    pub fn get(&self, ctx: &Context, name: &str) -> StoreResult<R> {
        ctx.check()?;
        let key = self.object_key(ctx, name)?;
        self.read_object(&key)?
            .ok_or_else(|| StoreError::not_found(&self.shared.resource, name))
    }

    /// Objects matching `opts`, sorted by namespace then name, with the
    /// store version they reflect.
    ///
    /// Without a namespace in `ctx` the list spans every namespace.
    pub fn list(&self, ctx: &Context, opts: &ListOptions) -> StoreResult<ObjectList<R>> {
        ctx.check()?;
        let state = self.read_state()?;
        let items = self.list_matching(ctx, opts)?;
        Ok(ObjectList {
            resource_version: format_resource_version(state.version),
            items,
        })
    }

    /// Update the object `name`, returning it and whether it was created.
    ///
    /// An update that leaves a deletion-marked object without finalizers
    /// removes it; the returned object is then the final state and a
    /// `Deleted` event is published instead of `Modified`.
    pub fn update(
        &self,
        ctx: &Context,
        name: &str,
        info: UpdateInfo<R>,
        force_allow_create: bool,
    ) -> StoreResult<(R, bool)> {
        ctx.check()?;
        let resource = &self.shared.resource;
        let mut state = self.lock_for_mutation(ctx)?;
        let key = self.object_key(ctx, name)?;

        let Some(current) = self.read_object(&key)? else {
            return match info.action {
                UpdateAction::Replace(obj)
                    if info.preconditions.is_none()
                        && force_allow_create
                        && self.strategy.allow_create_on_update() =>
                {
                    let obj = self.create_on_update(ctx, name, obj)?;
                    let created = self.commit_write(&mut state, &key, obj, WatchEvent::added)?;
                    debug!(resource = %resource, name = %created.metadata().key(), "object created by update");
                    Ok((created, true))
                }
                _ => Err(StoreError::not_found(resource, name)),
            };
        };

        if let Some(preconditions) = &info.preconditions {
            preconditions.check(resource, &current)?;
        }

        let mut updated = match info.action {
            UpdateAction::Modify(update) => update(current.clone())?,
            UpdateAction::Replace(obj) => obj,
        };

        let proposed = parse_resource_version(&updated.metadata().resource_version).map_err(|e| {
            StoreError::invalid(
                resource,
                name,
                vec![FieldError::invalid(
                    "metadata.resourceVersion",
                    &updated.metadata().resource_version,
                    e.to_string(),
                )],
            )
        })?;
        if proposed != 0 && proposed != get_resource_version(&current)? {
            return Err(StoreError::conflict(resource, name, MODIFIED_REASON));
        }

        self.check_identity(ctx, name, &mut updated)?;
        self.strategy.prepare_for_update(&current, &mut updated);
        self.strategy.default(&mut updated);

        {
            let (old, new) = (current.metadata(), updated.metadata_mut());
            new.uid = old.uid.clone();
            new.creation_timestamp = old.creation_timestamp;
            new.deletion_timestamp = old.deletion_timestamp;
            new.deletion_grace_period_seconds = old.deletion_grace_period_seconds;
            new.resource_version = old.resource_version.clone();
        }

        let mut errs = validate_object_meta(updated.metadata(), self.shared.config.validate_labels);
        errs.extend(self.strategy.validate_update(&updated, &current));
        if current.metadata().is_deletion_marked() && self.strategy.subresource().is_none() {
            errs.extend(self.deletion_marked_violations(&current, &updated)?);
        }
        if !errs.is_empty() {
            return Err(StoreError::invalid(resource, name, errs));
        }

        let meta = updated.metadata();
        if meta.is_deletion_marked() && meta.finalizers.is_empty() {
            let deleted = self.commit_delete(&mut state, &key, updated)?;
            debug!(resource = %resource, name = %deleted.metadata().key(), "last finalizer removed, object deleted");
            return Ok((deleted, false));
        }

        let updated = self.commit_write(&mut state, &key, updated, WatchEvent::modified)?;
        debug!(
            resource = %resource,
            name = %updated.metadata().key(),
            version = %updated.metadata().resource_version,
            "object updated"
        );
        Ok((updated, false))
    }

    /// Delete the object `name`, returning its last state and whether it
    /// was removed right away.
    ///
    /// An object with finalizers is only marked: it gets a
    /// `deletionTimestamp` and a zero grace period, and is removed once an
    /// update clears its last finalizer. Deleting an already marked object
    /// returns it unchanged.
    pub fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> StoreResult<(R, bool)> {
        ctx.check()?;
        let resource = &self.shared.resource;
        let mut state = self.lock_for_mutation(ctx)?;
        let key = self.object_key(ctx, name)?;

        let current = self
            .read_object(&key)?
            .ok_or_else(|| StoreError::not_found(resource, name))?;
        if let Some(preconditions) = &opts.preconditions {
            preconditions.check(resource, &current)?;
        }

        if current.metadata().finalizers.is_empty() {
            let deleted = self.commit_delete(&mut state, &key, current)?;
            debug!(resource = %resource, name = %deleted.metadata().key(), "object deleted");
            return Ok((deleted, true));
        }

        if current.metadata().is_deletion_marked() {
            return Ok((current, false));
        }

        let mut marked = current;
        let meta = marked.metadata_mut();
        meta.deletion_timestamp = Some(Utc::now());
        meta.deletion_grace_period_seconds = Some(0);
        let marked = self.commit_write(&mut state, &key, marked, WatchEvent::modified)?;
        debug!(
            resource = %resource,
            name = %marked.metadata().key(),
            finalizers = ?marked.metadata().finalizers,
            "object marked for deletion"
        );
        Ok((marked, false))
    }

    /// Watch objects matching `opts`.
    ///
    /// With no `resource_version` (or `"0"`) the watcher first receives an
    /// `Added` event for every matching object, oldest version first. With
    /// a version, typically from a list, it receives every retained change
    /// after it; if those were already evicted the watch fails with
    /// [`StoreError::Expired`]. A version the store has not reached yet
    /// fails with [`StoreError::TooLargeResourceVersion`]. Either way the
    /// live stream continues from the next commit without gaps or
    /// duplicates.
    pub fn watch(&self, ctx: &Context, opts: ListOptions) -> StoreResult<Watcher<R>> {
        ctx.check()?;
        let resource = &self.shared.resource;
        let since = match opts.resource_version.as_deref() {
            Some(v) => parse_resource_version(v).map_err(|e| {
                StoreError::invalid(
                    resource,
                    "",
                    vec![FieldError::invalid("resourceVersion", v, e.to_string())],
                )
            })?,
            None => 0,
        };

        let mut filter = opts;
        if let Some(ns) = ctx.namespace() {
            filter.field_selector = filter
                .field_selector
                .and_equal("metadata.namespace", ns)?;
        }

        let state = self.read_state()?;
        if since > state.version {
            return Err(StoreError::TooLargeResourceVersion {
                requested: since,
                current: state.version,
            });
        }
        let initial = if since == 0 {
            let mut items = self.list_matching(ctx, &filter)?;
            items.sort_by_key(|obj| get_resource_version(obj).unwrap_or(0));
            items.into_iter().map(WatchEvent::added).collect()
        } else {
            self.shared.hub.events_since(since, &filter)?
        };
        Ok(self.shared.hub.subscribe(filter, initial))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock_for_mutation(&self, ctx: &Context) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        let guard = self.shared.state.write().map_err(poisoned)?;
        ctx.check()?;
        Ok(guard)
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.shared.state.read().map_err(poisoned)
    }

    /// File key for `name` in the context's namespace.
    fn object_key(&self, ctx: &Context, name: &str) -> StoreResult<String> {
        let resource = &self.shared.resource;
        let mut errs = validate_object_name(name, "metadata.name");
        if let Some(ns) = ctx.namespace() {
            errs.extend(namespace_errors(ns));
        }
        if !errs.is_empty() {
            return Err(StoreError::invalid(resource, name, errs));
        }
        Ok(match ctx.namespace() {
            Some(ns) => format!("{}/{ns}/{name}{OBJECT_SUFFIX}", resource.resource),
            None => format!("{}/{name}{OBJECT_SUFFIX}", resource.resource),
        })
    }

    fn read_object(&self, key: &str) -> StoreResult<Option<R>> {
        match self.shared.fs.read(key) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_matching(&self, ctx: &Context, opts: &ListOptions) -> StoreResult<Vec<R>> {
        let resource = &self.shared.resource.resource;
        let prefix = match ctx.namespace() {
            Some(ns) => {
                let errs = namespace_errors(ns);
                if !errs.is_empty() {
                    return Err(StoreError::invalid(&self.shared.resource, ns, errs));
                }
                format!("{resource}/{ns}/")
            }
            None => format!("{resource}/"),
        };

        let mut items = Vec::new();
        for key in self.shared.fs.list(&prefix)? {
            if !key.ends_with(OBJECT_SUFFIX) {
                continue;
            }
            let bytes = match self.shared.fs.read(&key) {
                Ok(bytes) => bytes,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<R>(&bytes) {
                Ok(obj) if opts.matches(obj.metadata()) => items.push(obj),
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable object file"),
            }
        }
        items.sort_by(|a, b| {
            let (a, b) = (a.metadata(), b.metadata());
            (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name))
        });
        Ok(items)
    }

    /// Name and namespace of a submitted object must match the request.
    /// Empty ones are filled in.
    fn check_identity(&self, ctx: &Context, name: &str, obj: &mut R) -> StoreResult<()> {
        let resource = &self.shared.resource;
        let namespace = ctx.namespace().unwrap_or_default();
        let meta = obj.metadata_mut();
        if meta.name.is_empty() {
            meta.name = name.to_string();
        }
        if meta.namespace.is_empty() {
            meta.namespace = namespace.to_string();
        }

        let mut errs = Vec::new();
        if meta.name != name {
            errs.push(FieldError::invalid(
                "metadata.name",
                &meta.name,
                format!("does not match the name of the request ({name})"),
            ));
        }
        if meta.namespace != namespace {
            errs.push(FieldError::invalid(
                "metadata.namespace",
                &meta.namespace,
                "does not match the namespace of the request",
            ));
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(StoreError::invalid(resource, name, errs))
        }
    }

    /// Run create hooks and stamp system fields on an object about to be
    /// stored for the first time.
    fn prepare_new(&self, ctx: &Context, mut obj: R) -> StoreResult<R> {
        let resource = &self.shared.resource;
        let name = obj.metadata().name.clone();
        self.check_identity(ctx, &name, &mut obj)?;

        self.strategy.prepare_for_create(&mut obj);
        self.strategy.default(&mut obj);

        let meta = obj.metadata_mut();
        meta.uid = Uuid::now_v7().to_string();
        meta.creation_timestamp = Some(Utc::now());
        meta.deletion_timestamp = None;
        meta.deletion_grace_period_seconds = None;
        meta.resource_version.clear();

        let mut errs = validate_object_meta(obj.metadata(), self.shared.config.validate_labels);
        errs.extend(self.strategy.validate(&obj));
        if errs.is_empty() {
            Ok(obj)
        } else {
            Err(StoreError::invalid(resource, name, errs))
        }
    }

    fn create_on_update(&self, ctx: &Context, name: &str, mut obj: R) -> StoreResult<R> {
        if obj.metadata().name.is_empty() {
            obj.metadata_mut().name = name.to_string();
        }
        self.check_identity(ctx, name, &mut obj)?;
        self.prepare_new(ctx, obj)
    }

    /// While deletion is pending only finalizers may be removed and labels
    /// or annotations changed.
    fn deletion_marked_violations(&self, current: &R, updated: &R) -> StoreResult<Vec<FieldError>> {
        let mut errs = Vec::new();
        let old = current.metadata();
        for f in &updated.metadata().finalizers {
            if !old.has_finalizer(f) {
                errs.push(FieldError::forbidden(
                    "metadata.finalizers",
                    format!("no new finalizers can be added if the object is being deleted, found new finalizer {f:?}"),
                ));
            }
        }
        if errs.is_empty() && !differs_only_in_mutable_metadata(current, updated)? {
            errs.push(FieldError::forbidden(
                "",
                "object is being deleted: only finalizers, labels, and annotations may change",
            ));
        }
        Ok(errs)
    }

    /// Stamp the next version on `obj`, write it, then publish. A failed
    /// write consumes no version.
    fn commit_write(
        &self,
        state: &mut StoreState,
        key: &str,
        mut obj: R,
        event: fn(R) -> WatchEvent<R>,
    ) -> StoreResult<R> {
        let version = state.version + 1;
        set_resource_version(&mut obj, version)?;
        let bytes = serde_json::to_vec_pretty(&obj)?;
        self.shared.fs.write(key, &bytes)?;
        state.version = version;
        self.shared.hub.publish(event(obj.clone()));
        Ok(obj)
    }

    fn commit_delete(&self, state: &mut StoreState, key: &str, mut obj: R) -> StoreResult<R> {
        let version = state.version + 1;
        set_resource_version(&mut obj, version)?;
        let marker = format!("{}/{VERSION_MARKER}", self.shared.resource.resource);
        self.shared
            .fs
            .write(&marker, format_resource_version(version).as_bytes())?;
        self.shared.fs.delete(key)?;
        state.version = version;
        self.shared.hub.publish(WatchEvent::deleted(obj.clone()));
        Ok(obj)
    }
}

/// Namespace directories sit next to cluster-scoped object files, so a
/// namespace may not end in the object file extension.
fn namespace_errors(namespace: &str) -> Vec<FieldError> {
    let mut errs = validate_object_name(namespace, "metadata.namespace");
    if namespace.ends_with(OBJECT_SUFFIX) {
        errs.push(FieldError::invalid(
            "metadata.namespace",
            namespace,
            format!("may not end in {OBJECT_SUFFIX:?}"),
        ));
    }
    errs
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Internal(format!("store lock poisoned: {e}"))
}

impl<R: Resource> std::fmt::Debug for FileStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("resource", &self.shared.resource)
            .field("strategy", &self.strategy.name())
            .field("version", &self.current_version())
            .finish()
    }
}
