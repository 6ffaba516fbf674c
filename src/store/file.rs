//! File-backed credential store.
//!
//! The whole store is one JSON document keyed by team id:
//!
//! ```json
//! { "teams": { "T123": { "access_token": "...", "refresh_token": "...", "expires_at": 1750000000 } } }
//! ```
//!
//! Writes go through a single writer lock and land via temp-file-then-rename,
//! so a crash mid-write never leaves a half-written document and two racing
//! upserts for different teams cannot lose each other's update.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AuthError;

/// One team's OAuth credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    /// Absent means the record can never be refreshed again; the team has to
    /// reinstall. Surfaced as a distinct failure, not retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Epoch seconds after which `access_token` is invalid.
    pub expires_at: i64,
}

/// On-disk document layout. Unknown fields are ignored on load so newer
/// writers can add fields without breaking older readers.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    teams: HashMap<String, CredentialRecord>,
}

/// File-backed store for per-team credentials.
pub struct CredentialStore {
    path: PathBuf,
    /// Serializes the load-merge-store sequence in `upsert`.
    writer: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Read the full on-disk mapping. A missing file is an empty store,
    /// not an error.
    pub async fn load(&self) -> Result<HashMap<String, CredentialRecord>, AuthError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(AuthError::Store(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let file: TokenFile = serde_json::from_slice(&bytes).map_err(|e| {
            AuthError::Store(format!("failed to parse {}: {e}", self.path.display()))
        })?;

        Ok(file.teams)
    }

    /// Look up a single team's record.
    pub async fn get(&self, team_id: &str) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self.load().await?.remove(team_id))
    }

    /// Snapshot of every team id currently in the store.
    pub async fn team_ids(&self) -> Result<Vec<String>, AuthError> {
        Ok(self.load().await?.into_keys().collect())
    }

    /// Merge one team's record into the document and persist the whole thing.
    ///
    /// Read-modify-write runs under the writer lock; the document is written
    /// to a sibling temp file and renamed over the target so the store is
    /// never observable in a partially-written state.
    pub async fn upsert(&self, team_id: &str, record: CredentialRecord) -> Result<(), AuthError> {
        let _guard = self.writer.lock().await;

        let mut teams = self.load().await?;
        teams.insert(team_id.to_string(), record);

        let json = serde_json::to_vec_pretty(&TokenFile { teams })
            .map_err(|e| AuthError::Store(format!("failed to serialize token file: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AuthError::Store(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        // The writer lock makes the fixed temp name safe.
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| AuthError::Store(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AuthError::Store(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(())
    }
}
