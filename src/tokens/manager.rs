//! Token lifecycle manager.
//!
//! Owns the expiry decision and the refresh exchange for every team, and is
//! the sole mutator of the credential store. Per-team states are implicit:
//! no record, valid, expired, or refresh-failed — evaluated lazily against
//! wall-clock time whenever a token is requested.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::AuthError;
use crate::providers::ChatOAuth;
use crate::store::{CredentialRecord, CredentialStore};

/// Fixed validity window stamped on every record at install and refresh
/// time. Slack's rotation responses carry no expiry hint in this flow, so
/// the window is policy, not provider-derived.
pub const TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

pub struct TokenManager {
    store: CredentialStore,
    chat: Arc<dyn ChatOAuth>,
    /// One refresh lock per team, created lazily and kept for the life of
    /// the process. Guards the read-check-refresh-write sequence so two
    /// callers observing the same expired record cannot both hit the
    /// upstream exchange (the second would fail anyway: the first rotation
    /// invalidates the refresh token it sent).
    refresh_locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(store: CredentialStore, chat: Arc<dyn ChatOAuth>) -> Self {
        Self {
            store,
            chat,
            refresh_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Return a currently-valid access token for the team, refreshing first
    /// if the stored one has expired.
    pub async fn get_valid_token(&self, team_id: &str) -> Result<String, AuthError> {
        let record = self
            .store
            .get(team_id)
            .await?
            .ok_or_else(|| AuthError::MissingCredential(team_id.to_string()))?;

        if record.expires_at > Utc::now().timestamp() {
            return Ok(record.access_token);
        }

        self.refresh(team_id).await
    }

    /// Exchange an authorization code for a team's initial token pair and
    /// persist it. Returns the team id the provider reported.
    pub async fn complete_authorization(&self, code: &str) -> Result<String, AuthError> {
        let grant = self.chat.exchange_code(code).await?;

        self.store
            .upsert(
                &grant.team_id,
                CredentialRecord {
                    access_token: grant.access_token,
                    refresh_token: grant.refresh_token,
                    expires_at: Utc::now().timestamp() + TOKEN_TTL_SECS,
                },
            )
            .await?;

        info!("Installed app for team {}", grant.team_id);
        Ok(grant.team_id)
    }

    /// Refresh the team's token pair, serialized per team.
    async fn refresh(&self, team_id: &str) -> Result<String, AuthError> {
        let lock = self.refresh_lock(team_id);
        let _guard = lock.lock().await;

        // Re-read under the lock: whoever held it before us may have
        // refreshed already, in which case the stored token is the one the
        // upstream now recognizes.
        let record = self
            .store
            .get(team_id)
            .await?
            .ok_or_else(|| AuthError::MissingCredential(team_id.to_string()))?;

        if record.expires_at > Utc::now().timestamp() {
            return Ok(record.access_token);
        }

        let refresh_token = record
            .refresh_token
            .ok_or_else(|| AuthError::RefreshTokenAbsent(team_id.to_string()))?;

        let tokens = self.chat.exchange_refresh_token(&refresh_token).await?;

        // Persist exactly what the exchange returned: the provider rotates
        // refresh tokens, and the one we just sent is no longer usable.
        self.store
            .upsert(
                team_id,
                CredentialRecord {
                    access_token: tokens.access_token.clone(),
                    refresh_token: tokens.refresh_token,
                    expires_at: Utc::now().timestamp() + TOKEN_TTL_SECS,
                },
            )
            .await?;

        info!("Refreshed token for team {team_id}");
        Ok(tokens.access_token)
    }

    fn refresh_lock(&self, team_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock().expect("refresh lock table poisoned");
        locks
            .entry(team_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
