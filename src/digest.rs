//! digest command: extract today's reading into text and HTML artifacts
//!
//! Renders the devotional page, pulls the scripture and commentary out
//! of the DOM, writes both artifacts to disk, and hands the HTML to the
//! email layer. Extraction and disk failures abort the run; a failed
//! email never does.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use tokio::fs;

use crate::browser::BrowserSession;
use crate::config::{MailOpts, DEFAULT_URL};
use crate::extract::{self, CommentaryRecord, ScriptureRecord};
use crate::format;
use crate::mail;

#[derive(Args)]
pub struct DigestArgs {
    /// Page to extract from
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout: u64,

    /// Directory for the text and HTML artifacts
    #[arg(long, default_value = "texts", value_name = "DIR")]
    out_dir: PathBuf,

    #[command(flatten)]
    mail: MailOpts,
}

/// Run the digest command
pub async fn run_digest(args: DigestArgs) -> Result<()> {
    let now = Local::now();
    log::info!("extracting the daily digest from {}", args.url);

    let session = BrowserSession::launch(args.timeout).await?;
    session.goto(&args.url).await?;

    let html = session.html().await?;
    log::info!("scripture page loaded ({} bytes)", html.len());
    let scripture = extract::scripture_from_html(&html);

    let css = match session.stylesheet_text().await {
        Ok(css) => css,
        Err(err) => {
            log::warn!("could not capture page styles: {:#}", err);
            String::new()
        }
    };

    // The commentary lives behind a tab. A failed click usually means
    // the tab is already active, so keep going with the current DOM.
    if let Err(err) = session.click(extract::COMMENTARY_TAB).await {
        log::warn!("could not open the commentary tab: {:#}", err);
    }
    session.settle().await;
    let html = session.html().await?;
    log::info!("commentary page loaded ({} bytes)", html.len());
    let commentary = extract::commentary_from_html(&html);

    session.close().await?;

    log::info!(
        "extracted {} verses and {} commentary sections",
        scripture.verses.len(),
        commentary.sections.len()
    );

    let artifacts = write_artifacts(&args.out_dir, now, &scripture, &commentary, &css).await?;
    log::info!(
        "saved {} and {}",
        artifacts.text.display(),
        artifacts.html.display()
    );

    mail::deliver(&args.mail.to_config(), now, &artifacts.rendered).await;
    Ok(())
}

struct Artifacts {
    text: PathBuf,
    html: PathBuf,
    rendered: String,
}

fn artifact_paths(out_dir: &Path, now: DateTime<Local>) -> (PathBuf, PathBuf) {
    let stamp = format::file_stamp(now);
    (
        out_dir.join(format!("bible_content_{}.txt", stamp)),
        out_dir.join(format!("bible_content_{}.html", stamp)),
    )
}

async fn write_artifacts(
    out_dir: &Path,
    now: DateTime<Local>,
    scripture: &ScriptureRecord,
    commentary: &CommentaryRecord,
    css: &str,
) -> Result<Artifacts> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let sections = format::digest_sections(scripture, commentary);
    let text = format::text_artifact(&sections);
    let rendered =
        format::render_document(scripture, commentary, css, &format::display_date(now));

    let (text_path, html_path) = artifact_paths(out_dir, now);
    fs::write(&text_path, &text)
        .await
        .with_context(|| format!("failed to write {}", text_path.display()))?;
    fs::write(&html_path, &rendered)
        .await
        .with_context(|| format!("failed to write {}", html_path.display()))?;

    Ok(Artifacts {
        text: text_path,
        html: html_path,
        rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Verse;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 1, 6, 30, 0).unwrap()
    }

    fn sample_scripture() -> ScriptureRecord {
        ScriptureRecord {
            header: "시편 23편".to_string(),
            verses: vec![Verse {
                number: "1".to_string(),
                text: "여호와는 나의 목자시니".to_string(),
            }],
        }
    }

    #[test]
    fn test_artifact_paths_are_date_stamped() {
        let (text, html) = artifact_paths(Path::new("texts"), noon());
        assert_eq!(text, Path::new("texts/bible_content_20250101.txt"));
        assert_eq!(html, Path::new("texts/bible_content_20250101.html"));
    }

    #[tokio::test]
    async fn test_write_artifacts_creates_directory_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("texts");
        let artifacts = write_artifacts(
            &out_dir,
            noon(),
            &sample_scripture(),
            &CommentaryRecord::default(),
            "",
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(&artifacts.text).unwrap();
        assert!(text.contains("===== 말씀 ====="));
        assert!(text.contains("1. 여호와는 나의 목자시니"));

        let html = std::fs::read_to_string(&artifacts.html).unwrap();
        assert_eq!(html, artifacts.rendered);
        assert!(html.contains("시편 23편"));
    }
}
