// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod cache;
mod config;
mod download;
mod logging;
mod metadata;
mod s3;
mod sync;

use crate::cache::{
    EventCache, EventSort, FileRecord, Partition, SortDirection, SqliteEventCache,
};
use crate::download::Downloader;
use crate::s3::S3Store;
use crate::sync::Reconciler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.toml",
        global = true
    )]
    config: String,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the year/month partitions available in the object store
    Partitions,
    /// Synchronize one partition's metadata into the local cache
    Sync {
        year: String,
        month: String,

        /// Sync even if the partition was synced recently
        #[arg(long)]
        force: bool,
    },
    /// Discover partitions and synchronize the stale ones
    SyncAll {
        /// Re-sync every partition regardless of age
        #[arg(long)]
        force: bool,
    },
    /// Show sync provenance for a partition
    Status {
        year: String,
        month: String,

        /// Poll until the partition reaches a terminal state
        #[arg(long)]
        watch: bool,
    },
    /// Browse cached events for a partition
    Events {
        year: String,
        month: String,

        /// Sort column: event-id, user-id, device-id, timestamp or file-count
        #[arg(long, default_value = "timestamp")]
        sort: EventSort,

        /// Sort direction: asc or desc
        #[arg(long = "dir", default_value = "desc")]
        direction: SortDirection,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Download every file of an event to the local downloads directory
    Download {
        year: String,
        month: String,
        event_id: String,
    },
    /// Remove an event's local download directory
    RemoveDownload {
        year: String,
        month: String,
        event_id: String,
    },
    /// Clear the local cache
    Reset,
}

#[derive(Serialize)]
struct EventWithFiles {
    #[serde(flatten)]
    summary: cache::EventSummary,
    files: Vec<FileRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cli.config, e);
            process::exit(1);
        }
    };

    let _log_guard = logging::init_logging(config.logging.as_ref(), cli.verbose)?;

    info!("Submission synchronizer v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(
        S3Store::new(&config.s3)
            .await
            .context("Failed to initialize S3 store")?,
    );
    let cache = Arc::new(
        SqliteEventCache::new(&config.cache.db_path)
            .context("Failed to initialize event cache")?,
    );
    let reconciler = Reconciler::new(
        store.clone(),
        cache.clone(),
        config.s3.base_prefix.clone(),
        config.sync.clone(),
    );

    match cli.command {
        Commands::Partitions => {
            let partitions = reconciler.discover_partitions().await?;
            if partitions.is_empty() {
                println!("No partitions found");
            }
            for partition in partitions {
                println!("{partition}");
            }
        }
        Commands::Sync { year, month, force } => {
            let partition = Partition::new(year, month);
            let outcome = match reconciler.sync_partition(&partition, force).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Sync failed: {e}");
                    process::exit(1);
                }
            };
            if outcome.skipped {
                println!(
                    "{partition}: synced recently ({}), skipped",
                    outcome
                        .last_synced_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                );
            } else {
                println!(
                    "{partition}: synced {} events ({} files)",
                    outcome.events_synced, outcome.files_synced
                );
            }
        }
        Commands::SyncAll { force } => {
            let outcome = match reconciler.sync_stale(force).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Batch sync failed: {e}");
                    process::exit(1);
                }
            };
            println!(
                "Synced {} partitions ({} events, {} files), skipped {} up-to-date",
                outcome.partitions_synced,
                outcome.events_synced,
                outcome.files_synced,
                outcome.partitions_skipped
            );
        }
        Commands::Status { year, month, watch } => {
            let partition = Partition::new(year, month);
            let status = if watch {
                let interval = Duration::from_secs(config.sync.poll_interval_seconds);
                reconciler.watch_until_terminal(&partition, interval).await?
            } else {
                reconciler.get_sync_status(&partition).await?
            };
            println!(
                "{partition}: {} (last synced: {})",
                status.status.as_str(),
                status
                    .last_synced_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        Commands::Events {
            year,
            month,
            sort,
            direction,
            json,
        } => {
            let partition = Partition::new(year, month);
            let summaries = cache.get_events(&partition, sort, direction).await?;

            if json {
                let mut detailed = Vec::with_capacity(summaries.len());
                for summary in summaries {
                    let files = cache.get_event_files(&summary.event.event_id).await?;
                    detailed.push(EventWithFiles { summary, files });
                }
                println!("{}", serde_json::to_string_pretty(&detailed)?);
            } else {
                if summaries.is_empty() {
                    println!("No cached events for {partition}; run sync first");
                }
                for summary in &summaries {
                    println!(
                        "{}\t{}\t{}\t{}\t{}\t{} files (video: {}, json: {}, jpg: {}, json.gz: {})\t{}",
                        summary.event.event_id,
                        summary.event.user_id,
                        summary.event.device_id,
                        summary.event.camera_model,
                        summary.event.timestamp.to_rfc3339(),
                        summary.file_count,
                        summary.file_types.video,
                        summary.file_types.json,
                        summary.file_types.jpg,
                        summary.file_types.json_gz,
                        summary.event.status.as_str(),
                    );
                }
            }
        }
        Commands::Download {
            year,
            month,
            event_id,
        } => {
            let partition = Partition::new(year, month);
            let downloader = Downloader::new(store, cache, &config.downloads.dir);
            let summary = match downloader.download_event(&partition, &event_id).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!("Download failed: {e}");
                    process::exit(1);
                }
            };
            println!(
                "Downloaded {} files for event {} to {}",
                summary.files,
                summary.event_id,
                summary.path.display()
            );
        }
        Commands::RemoveDownload {
            year,
            month,
            event_id,
        } => {
            let partition = Partition::new(year, month);
            let downloader = Downloader::new(store, cache, &config.downloads.dir);
            if downloader.remove_download(&partition, &event_id).await? {
                println!("Removed download for event {event_id}");
            } else {
                println!("No local download for event {event_id}");
            }
        }
        Commands::Reset => {
            info!("Clearing the local cache...");
            cache.clear_all().await?;
            println!("Cache cleared");
        }
    }

    Ok(())
}
