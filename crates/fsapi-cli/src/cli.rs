use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fsapi",
    about = "Inspect and edit an fsapi data directory",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Root of the data directory
    #[arg(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// Plural resource name, also the directory objects live under
    #[arg(long, global = true, default_value = "manifests")]
    pub resource: String,

    #[arg(long, global = true, default_value = "core.fsapi.dev")]
    pub group: String,

    /// Kind used in messages; derived from the resource name if omitted
    #[arg(long, global = true)]
    pub kind: Option<String>,

    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Store configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show one object
    Get(GetArgs),
    /// List objects
    List(ListArgs),
    /// Create an object from a JSON file
    Create(CreateArgs),
    /// Delete an object, or mark it if it has finalizers
    Delete(DeleteArgs),
    /// Stream changes until interrupted
    Watch(WatchArgs),
}

#[derive(Args)]
pub struct GetArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Label selector, e.g. `tier=web,env notin (dev)`
    #[arg(short = 'l', long)]
    pub selector: Option<String>,
    /// Field selector on metadata.name or metadata.namespace
    #[arg(long)]
    pub field_selector: Option<String>,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Path to the object, or `-` for stdin
    pub file: PathBuf,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub name: String,
    /// Only delete if the object still has this resourceVersion
    #[arg(long)]
    pub resource_version: Option<String>,
}

#[derive(Args)]
pub struct WatchArgs {
    #[arg(short = 'l', long)]
    pub selector: Option<String>,
    /// Print each object's status next to the event
    #[arg(long)]
    pub status: bool,
    /// How often to rescan the directory, in milliseconds
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,
}
