//! daily-bible: daily devotional extraction and delivery with headless Chrome
//!
//! Commands:
//! - digest: extract today's reading into text/HTML artifacts and email them
//! - snapshot: screenshot the reading regions and upload them to Google Photos

pub mod auth;
pub mod browser;
pub mod config;
pub mod digest;
pub mod extract;
pub mod format;
pub mod logging;
pub mod mail;
pub mod photos;
pub mod retry;
pub mod snapshot;

pub use digest::{run_digest, DigestArgs};
pub use extract::{CommentaryRecord, ScriptureRecord, Section, Verse};
pub use snapshot::{run_snapshot, SnapshotArgs};
