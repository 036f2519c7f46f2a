//! Mail and credential configuration
//!
//! The original deployment configured everything through environment
//! variables; clap's `env` support keeps those names working while the
//! rest of the code receives a plain config struct.

use clap::Args;
use std::path::PathBuf;

/// The daily reading page this tool is built around.
pub const DEFAULT_URL: &str = "https://sum.su.or.kr:8888/bible/today";

/// Mail and credential options shared by commands that send email.
#[derive(Args, Debug, Clone)]
pub struct MailOpts {
    /// Sender address for outgoing mail
    #[arg(long, env = "EMAIL_SENDER")]
    pub sender: Option<String>,

    /// Comma-separated recipient addresses
    #[arg(long, env = "EMAIL_RECIPIENT")]
    pub recipients: Option<String>,

    /// Gmail app password (SMTP submission)
    #[arg(long, env = "EMAIL_APP_PASSWORD", hide_env_values = true)]
    pub app_password: Option<String>,

    /// Legacy account password; rejected with a warning, never used
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// OAuth token file (JSON), rewritten after refresh or consent
    #[arg(long, env = "OAUTH_TOKEN_PATH", default_value = "token.json")]
    pub token_path: PathBuf,

    /// OAuth client secret file from the Google Cloud console
    #[arg(
        long,
        env = "OAUTH_CREDENTIALS_PATH",
        default_value = "credentials.json"
    )]
    pub credentials_path: PathBuf,
}

impl MailOpts {
    pub fn to_config(&self) -> MailConfig {
        MailConfig {
            sender: self.sender.clone(),
            recipients: self
                .recipients
                .as_deref()
                .map(parse_recipients)
                .unwrap_or_default(),
            app_password: self.app_password.clone(),
            legacy_password: self.password.clone(),
            token_path: self.token_path.clone(),
            credentials_path: self.credentials_path.clone(),
        }
    }
}

/// Resolved mail configuration handed to the distributor and the
/// credential manager.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub app_password: Option<String>,
    pub legacy_password: Option<String>,
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
}

/// Split a comma-separated recipient list, trimming whitespace and
/// dropping empty entries.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients_trims_and_drops_empties() {
        assert_eq!(
            parse_recipients("a@x.com, b@y.com ,, c@z.com,"),
            vec!["a@x.com", "b@y.com", "c@z.com"]
        );
    }

    #[test]
    fn test_parse_recipients_empty_input() {
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients(" , ,").is_empty());
    }

    #[test]
    fn test_to_config_resolves_recipients() {
        let opts = MailOpts {
            sender: Some("me@example.com".to_string()),
            recipients: Some("a@x.com, b@y.com".to_string()),
            app_password: None,
            password: None,
            token_path: PathBuf::from("token.json"),
            credentials_path: PathBuf::from("credentials.json"),
        };
        let config = opts.to_config();
        assert_eq!(config.sender.as_deref(), Some("me@example.com"));
        assert_eq!(config.recipients, vec!["a@x.com", "b@y.com"]);
        assert!(config.app_password.is_none());
    }
}
