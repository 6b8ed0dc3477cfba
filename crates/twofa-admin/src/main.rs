//! `twofa-admin` — operator tool for the two-factor record store.
//!
//! Reads `twofa.toml` (or the path given with `--config`) plus `TWOFA_*`
//! environment variables, opens the store, and applies one command.
//!
//! ```
//! twofa-admin init
//! twofa-admin show 0f8fad5b-d9cb-469f-a165-70867728950e
//! twofa-admin lock 0f8fad5bd9cb469fa16570867728950e
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use twofa_core::{context::Unrestricted, source::UserDataSource};
use twofa_store_sqlite::{SqliteUserDataSource, StoreConfig};
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Two-factor record store administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "twofa.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the table and index if they are missing.
  Init,
  /// Print a player's record.
  Show { identity: Uuid },
  /// Lock a player out.
  Lock { identity: Uuid },
  /// Lift a lock-out.
  Unlock { identity: Uuid },
  /// Delete a player's record so they must enrol again.
  Reset { identity: Uuid },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TWOFA"))
    .build()
    .context("failed to read config file")?;

  let store_cfg: StoreConfig = settings
    .try_deserialize()
    .context("failed to deserialise StoreConfig")?;

  // The admin tool has no latency-sensitive thread.
  let source = SqliteUserDataSource::open(&store_cfg, Arc::new(Unrestricted))
    .await
    .with_context(|| format!("failed to open store at {:?}", store_cfg.connection))?;

  run(&source, cli.command).await?;

  source.close().await.context("failed to flush and close store")?;
  Ok(())
}

async fn run(source: &SqliteUserDataSource, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Init => {
      tracing::info!("schema ready");
    }
    Command::Show { identity } => {
      let record = source
        .get_user(identity)
        .await?
        .with_context(|| format!("no two-factor record for {identity}"))?;
      println!("identity: {}", record.identity());
      println!(
        "address:  {}",
        record
          .last_address()
          .map_or_else(|| "-".to_string(), |a| a.to_string())
      );
      println!("enrolled: {}", record.secret().is_some());
      println!("locked:   {}", record.is_locked());
    }
    Command::Lock { identity } => set_locked(source, identity, true).await?,
    Command::Unlock { identity } => set_locked(source, identity, false).await?,
    Command::Reset { identity } => {
      if source.get_user(identity).await?.is_none() {
        bail!("no two-factor record for {identity}");
      }
      source.destroy_user(identity);
      tracing::info!(%identity, "record reset");
    }
  }
  Ok(())
}

async fn set_locked(source: &SqliteUserDataSource, identity: Uuid, locked: bool) -> anyhow::Result<()> {
  let record = source
    .get_user(identity)
    .await?
    .with_context(|| format!("no two-factor record for {identity}"))?;
  record.set_locked(locked);
  tracing::info!(%identity, locked, "lock flag updated");
  Ok(())
}
