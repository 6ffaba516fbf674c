use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Slack OAuth app credentials ─────────────────────────────────────
    pub client_id: String,
    pub client_secret: String,

    // ── Credential store ────────────────────────────────────────────────
    /// Path to the JSON document holding per-team token records.
    pub token_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .context("Invalid PORT")?,

            client_id: std::env::var("SLACK_CLIENT_ID")
                .context("SLACK_CLIENT_ID is required")?,
            client_secret: std::env::var("SLACK_CLIENT_SECRET")
                .context("SLACK_CLIENT_SECRET is required")?,

            token_file: std::env::var("TOKEN_FILE")
                .unwrap_or_else(|_| "slack_tokens.json".into())
                .into(),
        })
    }
}

// client_secret must never reach logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("token_file", &self.token_file)
            .finish()
    }
}
