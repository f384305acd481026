use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use colored::Colorize;
use fsapi_fs::RealFs;
use fsapi_storage::{Context, DeleteOptions, FileStore, Preconditions, StoreConfig};
use fsapi_strategy::DefaultStrategy;
use fsapi_types::{DynamicObject, FieldSelector, GroupResource, ListOptions, Resource, Selector};
use fsapi_watch::{EventType, WatchEvent};
use tracing::debug;

use crate::cli::*;

type Store = FileStore<DynamicObject>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(&cli)?;
    let ctx = match &cli.namespace {
        Some(ns) => Context::background().with_namespace(ns.as_str()),
        None => Context::background(),
    };
    let format = cli.format;
    match cli.command {
        Command::Get(args) => cmd_get(&store, &ctx, args, format),
        Command::List(args) => cmd_list(&store, &ctx, args, format),
        Command::Create(args) => cmd_create(&store, &ctx, args, format),
        Command::Delete(args) => cmd_delete(&store, &ctx, args, format),
        Command::Watch(args) => cmd_watch(&store, &ctx, args, format),
    }
}

fn open_store(cli: &Cli) -> anyhow::Result<Store> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    let kind = cli.kind.clone().unwrap_or_else(|| kind_for(&cli.resource));
    let resource = GroupResource::new(cli.group.as_str(), cli.resource.as_str(), kind);
    debug!(data_dir = %cli.data_dir.display(), resource = %resource, "opening store");
    let fs = Arc::new(RealFs::new(cli.data_dir.clone()));
    Ok(FileStore::open(fs, resource, Arc::new(DefaultStrategy::new()), config)?)
}

/// `manifests` -> `Manifest`.
fn kind_for(resource: &str) -> String {
    let singular = resource.strip_suffix('s').unwrap_or(resource);
    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cmd_get(store: &Store, ctx: &Context, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let obj = store.get(ctx, &args.name)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&obj)?),
        OutputFormat::Text => {
            let meta = obj.metadata();
            println!(
                "{} {} (version {})",
                store.resource().kind.dimmed(),
                meta.key().bold(),
                meta.resource_version.yellow()
            );
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
    }
    Ok(())
}

fn cmd_list(store: &Store, ctx: &Context, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut opts = ListOptions::default();
    if let Some(selector) = &args.selector {
        opts.label_selector = parse_selector(selector)?;
    }
    if let Some(fields) = &args.field_selector {
        opts.field_selector =
            FieldSelector::parse(fields).with_context(|| format!("invalid field selector {fields:?}"))?;
    }
    let list = store.list(ctx, &opts)?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "resourceVersion": list.resource_version,
                "items": list.items,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            for item in &list.items {
                let meta = item.metadata();
                let state = if meta.is_deletion_marked() {
                    "Terminating".red()
                } else {
                    "Active".green()
                };
                println!("{:<48} {:>8}  {}", meta.key().bold(), meta.resource_version.yellow(), state);
            }
            println!(
                "{}",
                format!("{} object(s) at version {}", list.len(), list.resource_version).dimmed()
            );
        }
    }
    Ok(())
}

fn cmd_create(store: &Store, ctx: &Context, args: CreateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = read_input(&args.file)?;
    let obj = DynamicObject::from_json(&bytes)
        .with_context(|| format!("{} is not a valid object", args.file.display()))?;
    let created = store.create(ctx, obj, None)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&created)?),
        OutputFormat::Text => println!(
            "{} Created {} (version {})",
            "✓".green().bold(),
            created.metadata().key().bold(),
            created.metadata().resource_version.yellow()
        ),
    }
    Ok(())
}

fn cmd_delete(store: &Store, ctx: &Context, args: DeleteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let opts = match args.resource_version {
        Some(v) => DeleteOptions::with_preconditions(Preconditions::resource_version(v)),
        None => DeleteOptions::default(),
    };
    let (obj, immediate) = store.delete(ctx, &args.name, &opts)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&obj)?),
        OutputFormat::Text if immediate => {
            println!("{} Deleted {}", "✓".green().bold(), obj.metadata().key().bold());
        }
        OutputFormat::Text => println!(
            "{} marked for deletion, waiting on finalizers: {}",
            obj.metadata().key().bold(),
            obj.metadata().finalizers.join(", ").yellow()
        ),
    }
    Ok(())
}

fn cmd_watch(store: &Store, ctx: &Context, args: WatchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut opts = ListOptions::default();
    if let Some(selector) = &args.selector {
        opts.label_selector = parse_selector(selector)?;
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch_directory(store, ctx, opts, &args, format))
}

/// Replay the current objects through a store watch, then rescan the
/// directory on every tick so writes by other processes show up too.
async fn watch_directory(
    store: &Store,
    ctx: &Context,
    opts: ListOptions,
    args: &WatchArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut known = BTreeMap::new();
    {
        let mut watcher = store.watch(ctx, opts.clone())?;
        while let Ok(event) = watcher.try_recv() {
            print_event(&event, args.status, format)?;
            known.insert(event.object.metadata().key(), event.object);
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(50)));
    ticker.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                let listed = store.list(ctx, &opts)?;
                for event in diff_snapshots(&mut known, listed.items) {
                    print_event(&event, args.status, format)?;
                }
            }
        }
    }
    Ok(())
}

/// Events turning the `known` snapshot into `current`, oldest version
/// first. `known` is replaced by `current`.
fn diff_snapshots(
    known: &mut BTreeMap<String, DynamicObject>,
    current: Vec<DynamicObject>,
) -> Vec<WatchEvent<DynamicObject>> {
    let current: BTreeMap<String, DynamicObject> = current
        .into_iter()
        .map(|obj| (obj.metadata().key(), obj))
        .collect();

    let mut events: Vec<_> = known
        .iter()
        .filter(|(key, _)| !current.contains_key(*key))
        .map(|(_, old)| WatchEvent::deleted(old.clone()))
        .collect();
    for (key, obj) in &current {
        match known.get(key) {
            None => events.push(WatchEvent::added(obj.clone())),
            Some(old) if old.metadata().resource_version != obj.metadata().resource_version => {
                events.push(WatchEvent::modified(obj.clone()))
            }
            Some(_) => {}
        }
    }
    events.sort_by_key(|e| e.version());
    *known = current;
    events
}

fn print_event(event: &WatchEvent<DynamicObject>, show_status: bool, format: OutputFormat) -> anyhow::Result<()> {
    let meta = event.object.metadata();
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "type": event.event_type.to_string(),
                "object": event.object,
            });
            println!("{}", serde_json::to_string(&out)?);
        }
        OutputFormat::Text => {
            let kind = event.event_type.to_string();
            let kind = match event.event_type {
                EventType::Added => kind.green(),
                EventType::Modified => kind.yellow(),
                EventType::Deleted => kind.red(),
            };
            let status = match event.object.fields.get("status") {
                Some(status) if show_status => format!("  {status}"),
                _ => String::new(),
            };
            println!("{:<9} {} {}{}", kind, meta.key().bold(), meta.resource_version.dimmed(), status);
        }
    }
    Ok(())
}

fn parse_selector(input: &str) -> anyhow::Result<Selector> {
    Selector::parse(input).with_context(|| format!("invalid label selector {input:?}"))
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use fsapi_types::ObjectMeta;
    use serde_json::json;

    fn object(name: &str, version: &str) -> DynamicObject {
        let mut meta = ObjectMeta::named(name);
        meta.resource_version = version.into();
        DynamicObject::new(meta)
    }

    fn cli(dir: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["fsapi", "--data-dir", dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn kind_is_derived_from_resource() {
        assert_eq!(kind_for("manifests"), "Manifest");
        assert_eq!(kind_for("widget"), "Widget");
        assert_eq!(kind_for(""), "");
    }

    #[test]
    fn diff_reports_added_modified_deleted() {
        let mut known = BTreeMap::new();
        let events = diff_snapshots(&mut known, vec![object("a", "1"), object("b", "2")]);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == EventType::Added));

        let events = diff_snapshots(&mut known, vec![object("a", "3")]);
        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.event_type, e.object.metadata.name.as_str()))
            .collect();
        assert_eq!(summary, vec![(EventType::Deleted, "b"), (EventType::Modified, "a")]);

        assert!(diff_snapshots(&mut known, vec![object("a", "3")]).is_empty());
    }

    #[test]
    fn create_get_delete_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("obj.json");
        let obj = json!({
            "apiVersion": "core.fsapi.dev/v1alpha1",
            "kind": "Manifest",
            "metadata": { "name": "web" },
            "spec": { "message": "hello" }
        });
        std::fs::write(&file, serde_json::to_vec(&obj).unwrap()).unwrap();
        let data = dir.path().join("data");

        run_command(cli(&data, &["create", file.to_str().unwrap()])).unwrap();
        run_command(cli(&data, &["get", "web", "--format", "json"])).unwrap();
        run_command(cli(&data, &["list", "-l", "tier!=db"])).unwrap();
        assert!(data.join("manifests").join("web.json").is_file());

        assert!(run_command(cli(&data, &["create", file.to_str().unwrap()])).is_err());
        assert!(run_command(cli(&data, &["delete", "web", "--resource-version", "7"])).is_err());
        run_command(cli(&data, &["delete", "web"])).unwrap();
        assert!(run_command(cli(&data, &["get", "web"])).is_err());
    }

    #[test]
    fn namespaced_create_lands_in_namespace_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("obj.json");
        std::fs::write(&file, br#"{"metadata":{"name":"db"}}"#).unwrap();
        let data = dir.path().join("data");

        run_command(cli(&data, &["-n", "team", "create", file.to_str().unwrap()])).unwrap();
        assert!(data.join("manifests").join("team").join("db.json").is_file());
        assert!(run_command(cli(&data, &["get", "db"])).is_err());
        run_command(cli(&data, &["-n", "team", "get", "db"])).unwrap();
    }

    #[test]
    fn bad_selector_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command(cli(dir.path(), &["list", "-l", "a in ("])).unwrap_err();
        assert!(err.to_string().contains("invalid label selector"));
    }
}
