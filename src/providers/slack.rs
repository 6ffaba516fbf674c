use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::traits::{AuthGrant, ChatOAuth, TokenSet};
use crate::error::AuthError;

/// Scopes requested at install time. Slack wants them comma-separated,
/// NOT space-separated.
const SCOPES: &str = "commands,chat:write";

/// Upper bound on any upstream call, so a hung exchange cannot hold a
/// per-team refresh lock indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack OAuth 2.0 + Web API client.
///
/// Quirks:
/// - `oauth.v2.access` handles both the code grant and `refresh_token` grant.
/// - Errors come back as HTTP 200 with `{"ok": false, "error": "..."}`.
/// - Bot tokens rotate when token rotation is enabled for the app.
pub struct SlackClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SlackTokenResponse {
    ok: bool,
    access_token: Option<String>,
    refresh_token: Option<String>,
    team: Option<SlackTeam>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackTeam {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl ChatOAuth for SlackClient {
    fn install_url(&self) -> String {
        format!(
            "https://slack.com/oauth/v2/authorize?client_id={client_id}&scope={scope}",
            client_id = urlencoding(&self.client_id),
            scope = urlencoding(SCOPES),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthGrant, AuthError> {
        let resp = self
            .http
            .post("https://slack.com/api/oauth.v2.access")
            .form(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeFailed(format!(
                "Slack token exchange failed: {body}"
            )));
        }

        let token_resp: SlackTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("failed to parse token response: {e}")))?;

        if !token_resp.ok {
            return Err(AuthError::ExchangeFailed(
                token_resp.error.unwrap_or_else(|| "unknown".into()),
            ));
        }

        let team_id = token_resp
            .team
            .map(|t| t.id)
            .ok_or_else(|| AuthError::ExchangeFailed("no team in response".into()))?;

        Ok(AuthGrant {
            team_id,
            access_token: token_resp
                .access_token
                .ok_or_else(|| AuthError::ExchangeFailed("no access_token in response".into()))?,
            refresh_token: token_resp.refresh_token,
        })
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let resp = self
            .http
            .post("https://slack.com/api/oauth.v2.access")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("refresh request failed: {e}")))?;

        let token_resp: SlackTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("failed to parse refresh response: {e}")))?;

        if !token_resp.ok {
            return Err(AuthError::RefreshFailed(
                token_resp.error.unwrap_or_else(|| "unknown".into()),
            ));
        }

        Ok(TokenSet {
            access_token: token_resp
                .access_token
                .ok_or_else(|| AuthError::RefreshFailed("no access_token in response".into()))?,
            refresh_token: token_resp.refresh_token,
        })
    }

    async fn post_message(
        &self,
        access_token: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), AuthError> {
        let resp = self
            .http
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(access_token)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|e| AuthError::SendFailed(format!("postMessage request failed: {e}")))?;

        let api_resp: SlackApiResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::SendFailed(format!("failed to parse postMessage response: {e}")))?;

        if !api_resp.ok {
            return Err(AuthError::SendFailed(
                api_resp.error.unwrap_or_else(|| "unknown".into()),
            ));
        }

        Ok(())
    }
}

fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
