//! Email delivery of the daily digest
//!
//! The transport is selected once from the configuration and the digest
//! is then handed to exactly one of: the Gmail REST API (OAuth2), Gmail
//! SMTP with an app password, or nothing at all. Delivery failures are
//! logged and swallowed so a broken mailbox never loses the day's
//! artifacts.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use crate::auth::Authenticator;
use crate::config::MailConfig;
use crate::format;

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
const SMTP_RELAY: &str = "smtp.gmail.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    OAuth2,
    AppPassword,
    LegacyWarnOnly,
    Unconfigured,
}

/// Pick the transport for this run. OAuth credentials win over an app
/// password; a bare legacy password only earns a warning because Gmail
/// stopped accepting those.
pub fn select(config: &MailConfig) -> Transport {
    if config.credentials_path.exists() {
        Transport::OAuth2
    } else if config.app_password.is_some() {
        Transport::AppPassword
    } else if config.legacy_password.is_some() {
        Transport::LegacyWarnOnly
    } else {
        Transport::Unconfigured
    }
}

/// Send the rendered digest to every configured recipient. Never fails:
/// missing configuration skips delivery and transport errors are logged.
pub async fn deliver(config: &MailConfig, now: DateTime<Local>, html: &str) {
    let sender = match config.sender.as_deref() {
        Some(sender) => sender,
        None => {
            log::warn!("EMAIL_SENDER is not set, skipping email delivery");
            return;
        }
    };
    if config.recipients.is_empty() {
        log::warn!("EMAIL_RECIPIENT is not set, skipping email delivery");
        return;
    }

    match select(config) {
        Transport::OAuth2 => {
            log::info!("sending digest via the Gmail API");
            if let Err(err) = send_oauth2(config, sender, now, html).await {
                log::error!("Gmail API delivery failed: {:#}", err);
            }
        }
        Transport::AppPassword => {
            log::info!("sending digest via SMTP with an app password");
            // Selection guarantees the password is present.
            let password = config.app_password.clone().unwrap_or_default();
            if let Err(err) = send_smtp(sender, &password, &config.recipients, now, html).await {
                log::error!("SMTP delivery failed: {:#}", err);
            }
        }
        Transport::LegacyWarnOnly => {
            log::warn!(
                "EMAIL_PASSWORD is set but Gmail no longer accepts plain passwords; \
                 set EMAIL_APP_PASSWORD or provide OAuth credentials"
            );
        }
        Transport::Unconfigured => {
            log::warn!(
                "no email transport configured (set EMAIL_APP_PASSWORD or provide \
                 OAuth credentials), skipping delivery"
            );
        }
    }
}

/// One digest message: a short plain-text note plus the full HTML as an
/// attachment, mirroring how the digest is archived on disk.
fn build_message(
    sender: &str,
    recipient: &str,
    now: DateTime<Local>,
    html: &str,
) -> Result<Message> {
    let from: Mailbox = sender
        .parse()
        .with_context(|| format!("invalid sender address {}", sender))?;
    let to: Mailbox = recipient
        .parse()
        .with_context(|| format!("invalid recipient address {}", recipient))?;
    let attachment_name = format!("bible_content_{}.html", format::file_stamp(now));
    Message::builder()
        .from(from)
        .to(to)
        .subject(format::subject(now))
        .multipart(
            MultiPart::mixed()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(body_note()),
                )
                .singlepart(
                    Attachment::new(attachment_name)
                        .body(html.to_string(), ContentType::TEXT_HTML),
                ),
        )
        .context("failed to build email message")
}

fn body_note() -> String {
    format!(
        "오늘의 성경 말씀과 해설을 첨부파일로 보내드립니다.\n\
         첨부된 HTML 파일을 열어 확인해 주세요.\n\n{}",
        format::FOOTER_NOTE
    )
}

#[derive(Debug, Deserialize)]
struct GmailSendResponse {
    id: String,
}

async fn send_oauth2(
    config: &MailConfig,
    sender: &str,
    now: DateTime<Local>,
    html: &str,
) -> Result<()> {
    let auth = Authenticator::new(&config.token_path, &config.credentials_path)?;
    let access_token = auth.access_token().await?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    for recipient in &config.recipients {
        let message = build_message(sender, recipient, now, html)?;
        let raw = URL_SAFE.encode(message.formatted());
        let response = http
            .post(GMAIL_SEND_URL)
            .bearer_auth(&access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .context("Gmail send request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gmail API returned {}: {}", status, body.trim());
        }
        let sent: GmailSendResponse = response
            .json()
            .await
            .context("Gmail API returned malformed JSON")?;
        log::info!("sent digest to {} (message id {})", recipient, sent.id);
    }
    Ok(())
}

async fn send_smtp(
    sender: &str,
    app_password: &str,
    recipients: &[String],
    now: DateTime<Local>,
    html: &str,
) -> Result<()> {
    let credentials = Credentials::new(sender.to_string(), app_password.to_string());
    let mailer: AsyncSmtpTransport<Tokio1Executor> =
        AsyncSmtpTransport::<Tokio1Executor>::relay(SMTP_RELAY)
            .context("failed to configure the SMTP relay")?
            .credentials(credentials)
            .build();

    for recipient in recipients {
        let message = build_message(sender, recipient, now, html)?;
        let response = mailer
            .send(message)
            .await
            .with_context(|| format!("SMTP send to {} failed", recipient))?;
        log::info!("sent digest to {} ({})", recipient, response.code());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::path::Path;

    fn config(dir: &Path) -> MailConfig {
        MailConfig {
            sender: Some("me@gmail.com".to_string()),
            recipients: vec!["you@example.com".to_string()],
            app_password: None,
            legacy_password: None,
            token_path: dir.join("token.json"),
            credentials_path: dir.join("credentials.json"),
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 1, 6, 30, 0).unwrap()
    }

    #[test]
    fn test_select_prefers_oauth_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.app_password = Some("abcd".to_string());
        fs::write(&cfg.credentials_path, "{}").unwrap();
        assert_eq!(select(&cfg), Transport::OAuth2);
    }

    #[test]
    fn test_select_app_password_without_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.app_password = Some("abcd".to_string());
        cfg.legacy_password = Some("hunter2".to_string());
        assert_eq!(select(&cfg), Transport::AppPassword);
    }

    #[test]
    fn test_select_legacy_password_warns_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.legacy_password = Some("hunter2".to_string());
        assert_eq!(select(&cfg), Transport::LegacyWarnOnly);
    }

    #[test]
    fn test_select_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select(&config(dir.path())), Transport::Unconfigured);
    }

    #[test]
    fn test_build_message_attaches_html() {
        let message = build_message(
            "me@gmail.com",
            "you@example.com",
            noon(),
            "<html><body>digest</body></html>",
        )
        .unwrap();
        let formatted = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(formatted.contains("From: me@gmail.com"));
        assert!(formatted.contains("To: you@example.com"));
        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("attachment; filename=\"bible_content_20250101.html\""));
        assert!(formatted.contains("text/html"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let result = build_message("me@gmail.com", "not an address", noon(), "<html></html>");
        assert!(result.is_err());
    }

    #[test]
    fn test_body_note_mentions_attachment_and_footer() {
        let note = body_note();
        assert!(note.contains("첨부"));
        assert!(note.contains(format::FOOTER_NOTE));
    }

    #[tokio::test]
    async fn test_deliver_without_sender_skips() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.sender = None;
        // Must return without attempting any network traffic.
        deliver(&cfg, noon(), "<html></html>").await;
    }

    #[tokio::test]
    async fn test_deliver_unconfigured_skips() {
        let dir = tempfile::tempdir().unwrap();
        deliver(&config(dir.path()), noon(), "<html></html>").await;
    }
}
