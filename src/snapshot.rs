//! snapshot command: capture the reading regions and upload them
//!
//! Screenshots the scripture and commentary containers as PNGs, then
//! pushes both to the Google Photos library. Credentials are resolved
//! before the browser launches so a hopeless run fails fast.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use tokio::fs;

use crate::auth::Authenticator;
use crate::browser::BrowserSession;
use crate::config::DEFAULT_URL;
use crate::extract;
use crate::format;
use crate::photos::PhotosClient;

#[derive(Args)]
pub struct SnapshotArgs {
    /// Page to capture
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout: u64,

    /// Directory for the captured images
    #[arg(long, default_value = "screenshots", value_name = "DIR")]
    out_dir: PathBuf,

    /// OAuth token file
    #[arg(long, env = "OAUTH_TOKEN_PATH", default_value = "token.json")]
    token_path: PathBuf,

    /// OAuth client secret file
    #[arg(long, env = "OAUTH_CREDENTIALS_PATH", default_value = "credentials.json")]
    credentials_path: PathBuf,
}

/// Run the snapshot command
pub async fn run_snapshot(args: SnapshotArgs) -> Result<()> {
    let now = Local::now();
    log::info!("capturing reading snapshots from {}", args.url);

    let auth = Authenticator::new(&args.token_path, &args.credentials_path)?;
    let token = auth.access_token().await?;

    let session = BrowserSession::launch(args.timeout).await?;
    session.goto(&args.url).await?;

    fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let word_path = capture_path(&args.out_dir, "word", now);
    session
        .save_element_png(extract::SCRIPTURE_CONTAINER, &word_path)
        .await?;
    log::info!("captured {}", word_path.display());

    if let Err(err) = session.click(extract::COMMENTARY_TAB).await {
        log::warn!("could not open the commentary tab: {:#}", err);
    }
    session.settle().await;

    let explanation_path = capture_path(&args.out_dir, "explanation", now);
    session
        .save_element_png(extract::COMMENTARY_CONTAINER, &explanation_path)
        .await?;
    log::info!("captured {}", explanation_path.display());

    session.close().await?;

    let client = PhotosClient::new(token)?;
    let date = format::display_date(now);
    for (label, path) in [
        (format::SECTION_SCRIPTURE, &word_path),
        (format::SECTION_COMMENTARY, &explanation_path),
    ] {
        client
            .upload_image(path, &upload_description(label, &date))
            .await?;
    }
    Ok(())
}

fn capture_path(out_dir: &Path, prefix: &str, now: DateTime<Local>) -> PathBuf {
    out_dir.join(format!("{}_{}.png", prefix, format::time_stamp(now)))
}

fn upload_description(label: &str, date: &str) -> String {
    format!("{} - {}", label, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 1, 6, 30, 0).unwrap()
    }

    #[test]
    fn test_capture_paths_carry_prefix_and_timestamp() {
        let word = capture_path(Path::new("screenshots"), "word", noon());
        assert_eq!(word, Path::new("screenshots/word_20250101_063000.png"));
        let explanation = capture_path(Path::new("screenshots"), "explanation", noon());
        assert_eq!(
            explanation,
            Path::new("screenshots/explanation_20250101_063000.png")
        );
    }

    #[test]
    fn test_upload_description_joins_label_and_date() {
        assert_eq!(
            upload_description("말씀", "2025년 01월 01일 (수요일)"),
            "말씀 - 2025년 01월 01일 (수요일)"
        );
    }
}
