//! Landsat STAC ingester.
//!
//! Turns Landsat-8 scene metadata into STAC catalog entries, either by
//! backfilling from the historical scene lists or per storage event.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ingester::app::{build_pipeline, scene_list_reader};
use ingester::server::{start_server, ServerState};
use ingester::IngesterConfig;
use ingestion::{BatchOptions, CollectionSelector, MergeOutcome};
use stac_common::DateRange;

#[derive(Parser, Debug)]
#[command(name = "landsat-stac")]
#[command(about = "Build a STAC catalog from Landsat-8 scene metadata")]
struct Args {
    /// Configuration file (YAML). Environment variables are used when absent.
    #[arg(short, long, global = true, env = "INGESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backfill the catalog from the scene lists
    Batch {
        /// Which scene lists to read: pre, c1 or all
        #[arg(long, default_value = "all")]
        collections: CollectionSelector,

        /// Include real-time tier scenes
        #[arg(long)]
        realtime: bool,

        /// Skip scenes whose entry already exists, before fetching metadata
        #[arg(long)]
        missing: bool,

        /// First acquisition date to include (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last acquisition date to include (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },

    /// Process one storage-event notification
    Trigger {
        /// Event document, `-` for stdin
        #[arg(long, default_value = "-")]
        event: String,
    },

    /// Serve storage events over HTTP
    Serve {
        #[arg(long, default_value = "0.0.0.0:8082", env = "INGESTER_BIND")]
        bind: SocketAddr,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut body = String::new();
        tokio::io::stdin()
            .read_to_string(&mut body)
            .await
            .context("Failed to read event from stdin")?;
        Ok(body)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read event {}", source))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    let config = IngesterConfig::load(args.config.as_deref())?;
    info!(
        bucket = %config.storage.bucket,
        prefix = %config.catalog_prefix,
        "Loaded configuration"
    );

    let pipeline = build_pipeline(&config).await?;

    match args.command {
        Command::Batch {
            collections,
            realtime,
            missing,
            start_date,
            end_date,
        } => {
            if let (Some(start), Some(end)) = (start_date, end_date) {
                if start > end {
                    bail!("--start-date {} is after --end-date {}", start, end);
                }
            }
            let options = BatchOptions {
                selector: collections,
                include_realtime: realtime,
                only_missing: missing,
                range: DateRange::new(start_date, end_date),
            };
            info!(?options, "Starting batch run");

            let reader = scene_list_reader(&config);
            let stats = pipeline.run_batch(&reader, &options).await?;
            info!(
                inserted = stats.inserted,
                failed = stats.failed,
                "Batch run finished"
            );
        }
        Command::Trigger { event } => {
            let document = read_event(&event).await?;
            let outcomes = pipeline.handle_event(&document).await?;
            for outcome in &outcomes {
                match outcome {
                    MergeOutcome::Inserted { location } => info!(location = %location, "Inserted"),
                    MergeOutcome::AlreadyExists { key } => info!(key = %key, "Already in catalog"),
                    MergeOutcome::Failed { id, error } => bail!("Failed to merge {}: {}", id, error),
                }
            }
        }
        Command::Serve { bind } => {
            let state = Arc::new(ServerState { pipeline });
            start_server(state, bind).await?;
        }
    }

    Ok(())
}
