//! daily-bible CLI
//!
//! Renders the daily devotional page in headless Chrome, then either
//! emails the day's reading or uploads screenshots of it to Google
//! Photos.

use anyhow::Result;
use clap::{Parser, Subcommand};

use daily_bible::digest::{run_digest, DigestArgs};
use daily_bible::logging;
use daily_bible::snapshot::{run_snapshot, SnapshotArgs};

#[derive(Parser)]
#[command(name = "daily-bible")]
#[command(version)]
#[command(about = "Daily devotional extraction and delivery with headless Chrome")]
#[command(
    long_about = "Renders the daily devotional page in headless Chrome, then either\nemails the day's reading or uploads screenshots of it to Google Photos.\n\nCommands:\n  digest      Extract today's reading and email it\n  snapshot    Screenshot the reading regions and upload them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract today's reading into text/HTML artifacts and email them
    Digest(DigestArgs),
    /// Screenshot the reading regions and upload them to Google Photos
    Snapshot(SnapshotArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Commands::Digest(args) => run_digest(args).await,
        Commands::Snapshot(args) => run_snapshot(args).await,
    }
}
