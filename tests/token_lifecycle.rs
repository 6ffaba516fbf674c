//! Lifecycle tests against a fake upstream client: expiry decisions,
//! refresh rotation, per-team serialization, and sweep behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Semaphore};

use teambot_auth::providers::{AuthGrant, ChatOAuth, TokenSet};
use teambot_auth::store::{CredentialRecord, CredentialStore};
use teambot_auth::tokens::manager::TOKEN_TTL_SECS;
use teambot_auth::tokens::{sweeper, TokenManager};
use teambot_auth::AuthError;

/// Fake upstream: programmable responses plus call counters, and an
/// optional gate that holds refresh exchanges open until released.
#[derive(Default)]
struct FakeChat {
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    send_calls: AtomicUsize,
    /// Code exchange outcome; `Err` text mimics the provider's error field.
    exchange_result: Option<Result<AuthGrant, String>>,
    /// Refresh grants keyed by the refresh token that was sent.
    refresh_grants: HashMap<String, TokenSet>,
    /// When set, a refresh exchange blocks until a permit is available.
    refresh_gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl ChatOAuth for FakeChat {
    fn install_url(&self) -> String {
        "https://slack.test/oauth/v2/authorize?client_id=fake".into()
    }

    async fn exchange_code(&self, _code: &str) -> Result<AuthGrant, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        match self.exchange_result.clone() {
            Some(Ok(grant)) => Ok(grant),
            Some(Err(reason)) => Err(AuthError::ExchangeFailed(reason)),
            None => Err(AuthError::ExchangeFailed("unexpected exchange".into())),
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.refresh_grants
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| AuthError::RefreshFailed("invalid_refresh_token".into()))
    }

    async fn post_message(
        &self,
        _access_token: &str,
        _channel: &str,
        _text: &str,
    ) -> Result<(), AuthError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn manager_with(dir: &tempfile::TempDir, fake: Arc<FakeChat>) -> TokenManager {
    let store = CredentialStore::new(dir.path().join("tokens.json"));
    TokenManager::new(store, fake)
}

fn record(access: &str, refresh: Option<&str>, expires_at: i64) -> CredentialRecord {
    CredentialRecord {
        access_token: access.into(),
        refresh_token: refresh.map(Into::into),
        expires_at,
    }
}

fn rotation(access: &str, refresh: &str) -> TokenSet {
    TokenSet {
        access_token: access.into(),
        refresh_token: Some(refresh.into()),
    }
}

#[tokio::test]
async fn valid_token_returned_without_upstream_call() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat::default());
    let manager = manager_with(&dir, fake.clone());

    let future = Utc::now().timestamp() + 600;
    manager
        .store()
        .upsert("T1", record("xoxb-live", Some("xoxe-live"), future))
        .await
        .unwrap();

    let token = manager.get_valid_token("T1").await.unwrap();
    assert_eq!(token, "xoxb-live");
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_record_is_a_distinct_failure() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat::default());
    let manager = manager_with(&dir, fake.clone());

    let err = manager.get_valid_token("T-unknown").await.unwrap_err();
    assert!(matches!(err, AuthError::MissingCredential(_)));
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_token_refreshes_once_and_rotates() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat {
        refresh_grants: HashMap::from([("abc".to_string(), rotation("new-a", "new-r"))]),
        ..Default::default()
    });
    let manager = manager_with(&dir, fake.clone());

    let before = Utc::now().timestamp();
    manager
        .store()
        .upsert("T1", record("xoxb-stale", Some("abc"), before - 1))
        .await
        .unwrap();

    let token = manager.get_valid_token("T1").await.unwrap();
    assert_eq!(token, "new-a");
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);

    // The rotated pair is what got persisted, with a fresh 12h window.
    let stored = manager.store().get("T1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "new-a");
    assert_eq!(stored.refresh_token.as_deref(), Some("new-r"));
    let expected = before + TOKEN_TTL_SECS;
    assert!((stored.expires_at - expected).abs() <= 5);
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let fake = Arc::new(FakeChat {
        refresh_grants: HashMap::from([("abc".to_string(), rotation("new-a", "new-r"))]),
        refresh_gate: Some(gate.clone()),
        ..Default::default()
    });
    let manager = Arc::new(manager_with(&dir, fake.clone()));

    manager
        .store()
        .upsert("T1", record("xoxb-stale", Some("abc"), Utc::now().timestamp() - 1))
        .await
        .unwrap();

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_valid_token("T1").await }
    });
    let second = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_valid_token("T1").await }
    });

    // Give both tasks time to reach the refresh path; only one may have
    // gotten through to the upstream.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);

    // Release more permits than callers: a duplicate exchange would also
    // get through and be counted.
    gate.add_permits(4);

    assert_eq!(first.await.unwrap().unwrap(), "new-a");
    assert_eq!(second.await.unwrap().unwrap(), "new-a");
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn absent_refresh_token_fails_without_upstream_call() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat::default());
    let manager = manager_with(&dir, fake.clone());

    manager
        .store()
        .upsert("T2", record("xoxb-dead", None, Utc::now().timestamp() - 1))
        .await
        .unwrap();

    let err = manager.get_valid_token("T2").await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenAbsent(_)));
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_refresh_is_reported_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat::default()); // no grants: every refresh fails
    let manager = manager_with(&dir, fake.clone());

    manager
        .store()
        .upsert("T1", record("xoxb-stale", Some("abc"), Utc::now().timestamp() - 1))
        .await
        .unwrap();

    let err = manager.get_valid_token("T1").await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshFailed(_)));
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);

    // The stale record is untouched; the next caller gets to retry.
    let stored = manager.store().get("T1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "xoxb-stale");
    assert_eq!(stored.refresh_token.as_deref(), Some("abc"));
}

#[tokio::test]
async fn successful_exchange_persists_record() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat {
        exchange_result: Some(Ok(AuthGrant {
            team_id: "T3".into(),
            access_token: "xoxb-new".into(),
            refresh_token: Some("xoxe-new".into()),
        })),
        ..Default::default()
    });
    let manager = manager_with(&dir, fake.clone());

    let before = Utc::now().timestamp();
    let team_id = manager.complete_authorization("good-code").await.unwrap();
    assert_eq!(team_id, "T3");
    assert_eq!(fake.exchange_calls.load(Ordering::SeqCst), 1);

    let stored = manager.store().get("T3").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "xoxb-new");
    assert_eq!(stored.refresh_token.as_deref(), Some("xoxe-new"));
    assert!((stored.expires_at - (before + TOKEN_TTL_SECS)).abs() <= 5);
}

#[tokio::test]
async fn failed_exchange_creates_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat {
        exchange_result: Some(Err("invalid_code".into())),
        ..Default::default()
    });
    let manager = manager_with(&dir, fake.clone());

    let err = manager.complete_authorization("bad-code").await.unwrap_err();
    match err {
        AuthError::ExchangeFailed(reason) => assert_eq!(reason, "invalid_code"),
        other => panic!("unexpected error: {other}"),
    }

    assert!(manager.store().load().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_refreshes_expired_teams_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat {
        refresh_grants: HashMap::from([("xoxe-old".to_string(), rotation("new-a", "new-r"))]),
        ..Default::default()
    });
    let manager = manager_with(&dir, fake.clone());

    let now = Utc::now().timestamp();
    manager
        .store()
        .upsert("T-expired", record("xoxb-old", Some("xoxe-old"), now - 10))
        .await
        .unwrap();
    manager
        .store()
        .upsert("T-fresh", record("xoxb-ok", Some("xoxe-ok"), now + 3600))
        .await
        .unwrap();

    sweeper::sweep(&manager).await.unwrap();
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);

    // Nothing is expired anymore, so a back-to-back sweep is a no-op.
    sweeper::sweep(&manager).await.unwrap();
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sweep_continues_past_failing_teams() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat {
        refresh_grants: HashMap::from([("xoxe-good".to_string(), rotation("new-a", "new-r"))]),
        ..Default::default()
    });
    let manager = manager_with(&dir, fake.clone());

    let now = Utc::now().timestamp();
    // Terminal-dead record: refresh impossible until reinstall.
    manager
        .store()
        .upsert("T-dead", record("xoxb-dead", None, now - 10))
        .await
        .unwrap();
    manager
        .store()
        .upsert("T-live", record("xoxb-old", Some("xoxe-good"), now - 10))
        .await
        .unwrap();

    sweeper::sweep(&manager).await.unwrap();

    // The dead team was skipped, the live one was refreshed.
    assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
    let stored = manager.store().get("T-live").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "new-a");
}

#[tokio::test]
async fn sweeper_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeChat::default());
    let manager = Arc::new(manager_with(&dir, fake));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(sweeper::run(
        manager,
        Duration::from_secs(3600),
        shutdown_rx,
    ));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}
