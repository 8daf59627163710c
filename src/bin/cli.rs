//! batchspool CLI
//!
//! Inspect and populate batch directories by hand.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use batchspool::clock::{self, SystemDateProvider};
use batchspool::config::DEFAULT_MAX_BLOCK_SIZE;
use batchspool::feature::FileWriter;
use batchspool::storage::{Directory, FilesOrchestrator, Orchestrator};
use batchspool::telemetry::TracingTelemetry;
use batchspool::tlv::{BlockReader, EventGenerator};
use batchspool::{PerformancePreset, Result};

/// batchspool CLI
#[derive(Parser, Debug)]
#[command(name = "batchspool")]
#[command(about = "Inspect and write batchspool batch directories")]
#[command(version)]
struct Args {
    /// Maximum accepted block payload (in bytes)
    #[arg(long, default_value_t = DEFAULT_MAX_BLOCK_SIZE)]
    max_block_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List batch files of a directory, oldest first
    Ls {
        /// Batch directory
        dir: PathBuf,
    },

    /// Decode a batch file and print its events
    Dump {
        /// Batch file
        file: PathBuf,
    },

    /// Append one event to a batch directory
    Write {
        /// Batch directory
        dir: PathBuf,

        /// Event payload
        data: String,

        /// Event metadata
        #[arg(short, long)]
        metadata: Option<String>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,batchspool=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match &args.command {
        Commands::Ls { dir } => list(dir),
        Commands::Dump { file } => dump(file, args.max_block_size),
        Commands::Write {
            dir,
            data,
            metadata,
        } => write(dir, data, metadata.as_deref(), args.max_block_size),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn list(dir: &Path) -> Result<()> {
    let directory = Directory::new(dir);
    let mut files = directory.files()?;
    files.sort_by_key(|f| clock::file_creation_time_from(f.name()));

    let now = std::time::SystemTime::now();
    for file in files {
        let age = clock::age(now, clock::file_creation_time_from(file.name()));
        println!(
            "{:>16}  {:>10} bytes  {:>8.1}s old",
            file.name(),
            file.size()?,
            age.as_secs_f64()
        );
    }
    Ok(())
}

fn dump(path: &Path, max_block_size: u64) -> Result<()> {
    let data = std::fs::read(path)?;
    let mut reader = BlockReader::new(data, max_block_size);
    let mut blocks = Vec::new();
    while let Some(block) = reader.next_block() {
        blocks.push(block);
    }

    for (i, event) in EventGenerator::new(&blocks).enumerate() {
        match &event.metadata {
            Some(metadata) => println!(
                "#{} {} (metadata: {})",
                i,
                String::from_utf8_lossy(&event.data),
                String::from_utf8_lossy(metadata)
            ),
            None => println!("#{} {}", i, String::from_utf8_lossy(&event.data)),
        }
    }

    if reader.stopped_early() {
        println!("-- {} trailing bytes could not be decoded", reader.remaining());
    }
    Ok(())
}

fn write(dir: &Path, data: &str, metadata: Option<&str>, max_block_size: u64) -> Result<()> {
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(FilesOrchestrator::new(
        Directory::open(dir)?,
        PerformancePreset::default(),
        Arc::new(SystemDateProvider),
        Arc::new(TracingTelemetry),
        None,
    ));
    let writer = FileWriter::new(
        orchestrator,
        false,
        None,
        Arc::new(TracingTelemetry),
        max_block_size,
    );

    let event = Bytes::copy_from_slice(data.as_bytes());
    let metadata = metadata.map(|m| Bytes::copy_from_slice(m.as_bytes()));
    writer.validate(&event, metadata.as_deref())?;
    writer.try_write(&event, metadata.as_deref())?;

    tracing::info!(dir = %dir.display(), bytes = data.len(), "Event written");
    Ok(())
}
