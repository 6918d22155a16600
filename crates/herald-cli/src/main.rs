//! `herald`: command-line access to a Herald SQLite store.
//!
//! Reads `herald.toml` (or the path specified with `--config`), layered with
//! `HERALD_*` environment variables, opens the store, and runs one command.
//!
//! # Usage
//!
//! ```text
//! herald source add billing "Billing"
//! herald medium add email "Email"
//! herald entity add team
//! herald subscribe billing email <team-id> --subentity-kind user
//! herald mediums billing <user-id>
//! herald filter billing email <user-id> <user-id> ...
//! herald subscriptions list billing --medium email
//! herald unsubscribes delete <unsubscribe-id>
//! ```

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use herald_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Resolve notification subscriptions")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "herald.toml")]
  config: PathBuf,

  /// Print results as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage notification sources.
  Source {
    #[command(subcommand)]
    action: CatalogAction,
  },
  /// Manage delivery mediums.
  Medium {
    #[command(subcommand)]
    action: CatalogAction,
  },
  /// Manage entities and their relationships.
  Entity {
    #[command(subcommand)]
    action: EntityAction,
  },
  /// Grant a source/medium to an entity, or to every descendant of a kind.
  Subscribe {
    source:         String,
    medium:         String,
    entity:         Uuid,
    #[arg(long)]
    subentity_kind: Option<String>,
  },
  /// Opt an individual entity out of a source/medium.
  Unsubscribe {
    source: String,
    medium: String,
    entity: Uuid,
  },
  /// List the mediums an entity (or a group beneath it) is subscribed to.
  Mediums {
    source:         String,
    entity:         Uuid,
    #[arg(long)]
    subentity_kind: Option<String>,
  },
  /// Check a single source/medium/entity combination.
  Check {
    source:         String,
    medium:         String,
    entity:         Uuid,
    #[arg(long)]
    subentity_kind: Option<String>,
  },
  /// Keep only the subscribed entities out of a list of one kind.
  Filter {
    source:   String,
    medium:   String,
    #[arg(required = true)]
    entities: Vec<Uuid>,
  },
  /// Check whether an entity has opted out of a source/medium.
  Unsubscribed {
    source: String,
    medium: String,
    entity: Uuid,
  },
  /// List or delete stored grants.
  Subscriptions {
    #[command(subcommand)]
    action: RecordAction,
  },
  /// List or delete stored opt-outs.
  Unsubscribes {
    #[command(subcommand)]
    action: RecordAction,
  },
}

#[derive(Subcommand)]
enum CatalogAction {
  /// Create an entry with a unique name.
  Add {
    name:         String,
    display_name: String,
    #[arg(long, default_value = "")]
    description:  String,
  },
  /// List all entries.
  List,
}

#[derive(Subcommand)]
enum RecordAction {
  /// List the records for a source, oldest first.
  List {
    source: String,
    #[arg(long)]
    medium: Option<String>,
    /// Only records naming this entity (as subscriber or group anchor).
    #[arg(long)]
    entity: Option<Uuid>,
  },
  /// Delete one record by id.
  Delete { id: Uuid },
}

#[derive(Subcommand)]
enum EntityAction {
  /// Create an entity of the given kind and print its id.
  Add { kind: String },
  /// Place `sub` directly beneath `super`.
  Relate {
    #[arg(value_name = "SUPER")]
    super_id: Uuid,
    #[arg(value_name = "SUB")]
    sub_id:   Uuid,
  },
}

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `herald.toml` and `HERALD_*`.
#[derive(Debug, Deserialize)]
struct HeraldConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from("herald.db") }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing on stderr so `--json` output stays clean.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("HERALD"))
    .build()
    .context("failed to read config file")?;

  let herald_cfg: HeraldConfig = settings
    .try_deserialize()
    .context("failed to deserialise HeraldConfig")?;

  let store_path = expand_tilde(&herald_cfg.store_path);
  tracing::debug!(?store_path, "opening store");

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  commands::run(&store, cli.command, cli.json).await
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
