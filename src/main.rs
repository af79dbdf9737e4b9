//! # shard-repair CLI (`shardrepair`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shardrepair check` | Report shards whose replicas disagree on object count |
//! | `shardrepair shards` | Show node health, the shard inventory, per-node counts, READONLY shards |
//! | `shardrepair repair <collection>` | Read-repair an inconsistent collection |
//! | `shardrepair locate <collection> <id> [--tenant <t>]` | Show which nodes serve an object |
//! | `shardrepair serve` | Start the dashboard HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! shardrepair --config ./config/shardrepair.toml check
//! shardrepair repair Article --batch-size 200
//! shardrepair locate Article 36ddd591-2dee-4e7e-a3cc-eb86d30a4303
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use shard_repair::cluster::HttpClusterApi;
use shard_repair::config::{self, Config};
use shard_repair::consistency::ConsistencyReport;
use shard_repair::driver::{drive_repair, DriveOutcome};
use shard_repair::progress::{ProgressMode, RepairProgressEvent};
use shard_repair::repair::RepairSettings;
use shard_repair::server;
use shard_repair::session::RepairSession;

/// Shard consistency checks and read repair for replicated vector database clusters.
#[derive(Parser)]
#[command(name = "shardrepair", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shardrepair.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report shards whose replicas disagree on object count.
    Check,

    /// Show shard placement: every replica, shard counts per node, READONLY shards.
    Shards,

    /// Read-repair one inconsistent collection.
    ///
    /// Runs a consistency check first; the collection must be among the
    /// affected ones. Ctrl-C stops the repair after the current batch.
    Repair {
        /// Collection to repair.
        collection: String,

        /// Override `[repair].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Progress output on stderr. Defaults to `human` on a TTY, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show which nodes serve an object.
    Locate {
        collection: String,
        id: String,

        /// Tenant to scope the lookup to, for multi-tenant collections.
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Start the dashboard HTTP API on `[server].bind`.
    Serve,
}

/// Initialize the `tracing` subscriber on stderr.
///
/// Respects `RUST_LOG` if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_session(cfg: &Config, batch_size: Option<usize>) -> Result<RepairSession> {
    let api = HttpClusterApi::from_config(&cfg.cluster)?;
    let mut settings = RepairSettings::from(&cfg.repair);
    if let Some(size) = batch_size {
        anyhow::ensure!(size > 0, "--batch-size must be > 0");
        settings.batch_size = size;
    }
    Ok(RepairSession::new(Arc::new(api), settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    setup_tracing(&cfg.logging.level);

    match cli.command {
        Commands::Check => {
            let mut session = build_session(&cfg, None)?;
            let report = session.check_consistency().await?;
            print_report(&report);
        }
        Commands::Shards => {
            let session = build_session(&cfg, None)?;
            let view = session.inventory().await?;

            println!(
                "{:<16} {:<10} {:<10} {:>10} {:>7}",
                "NODE", "STATUS", "VERSION", "OBJECTS", "SHARDS"
            );
            for n in &view.nodes {
                println!(
                    "{:<16} {:<10} {:<10} {:>10} {:>7}",
                    n.name,
                    n.status.as_deref().unwrap_or("-"),
                    n.version.as_deref().unwrap_or("-"),
                    n.stats.object_count,
                    n.stats.shard_count
                );
            }

            println!();
            println!(
                "{:<16} {:<24} {:<16} {:>10} {:<10} {:>7} {:<10} LOADED",
                "NODE", "COLLECTION", "SHARD", "OBJECTS", "INDEX", "QUEUE", "COMPRESSED"
            );
            for r in &view.records {
                println!(
                    "{:<16} {:<24} {:<16} {:>10} {:<10} {:>7} {:<10} {}",
                    r.node,
                    r.collection,
                    r.shard,
                    r.object_count,
                    r.indexing_status,
                    r.vector_queue_length,
                    r.compressed,
                    r.loaded
                );
            }

            println!();
            println!("{:<16} {:<24} SHARDS", "NODE", "COLLECTION");
            for c in &view.shard_counts {
                println!("{:<16} {:<24} {}", c.node, c.collection, c.shard_count);
            }

            if !view.readonly.is_empty() {
                println!();
                println!("READONLY shards:");
                for r in &view.readonly {
                    println!("  {} / {} on {}", r.collection, r.shard, r.node);
                }
            }
        }
        Commands::Repair {
            collection,
            batch_size,
            progress,
        } => {
            let mut session = build_session(&cfg, batch_size)?;
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();

            let report = session.check_consistency().await?;
            if report.is_consistent() {
                println!("All shards are consistent. No read repairs needed.");
                return Ok(());
            }
            print_report(&report);
            println!();

            reporter.report(RepairProgressEvent::Enumerating {
                collection: collection.clone(),
            });
            let handle = session.start_repair(&collection).await?;

            let mut stdout = std::io::stdout();
            let outcome = drive_repair(
                &mut session,
                &handle,
                Duration::from_millis(cfg.repair.pause_ms),
                reporter.as_ref(),
                &mut stdout,
                tokio::signal::ctrl_c(),
            )
            .await?;

            match outcome {
                DriveOutcome::Completed { .. } => {
                    println!("Read repairs complete for collection '{}'.", collection);
                }
                DriveOutcome::Stopped { processed, total } => {
                    warn!(collection = %collection, processed, total, "repair interrupted");
                }
            }
        }
        Commands::Locate {
            collection,
            id,
            tenant,
        } => {
            let session = build_session(&cfg, None)?;
            let nodes = session
                .locate_object(&collection, &id, tenant.as_deref())
                .await?;
            println!("{:<24} PRESENCE", "NODE");
            for n in &nodes {
                println!("{:<24} {}", n.node, n.presence.label());
            }
        }
        Commands::Serve => {
            let session = build_session(&cfg, None)?;
            server::run_server(&cfg.server.bind, session).await?;
        }
    }

    Ok(())
}

fn print_report(report: &ConsistencyReport) {
    println!("{}", report.summary());
    if report.is_consistent() {
        return;
    }
    println!();
    println!(
        "{:<24} {:<16} {:<16} {:>10}",
        "COLLECTION", "SHARD", "NODE", "OBJECTS"
    );
    for row in report.rows() {
        println!(
            "{:<24} {:<16} {:<16} {:>10}",
            row.collection, row.shard, row.node, row.object_count
        );
    }
}
