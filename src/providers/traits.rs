use async_trait::async_trait;

use crate::error::AuthError;

/// Tokens returned from a refresh exchange.
///
/// The refresh token rotates on every exchange: the returned value replaces
/// the one that was sent, and the old one is dead once the provider answers.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Result of an authorization-code exchange (install flow).
///
/// The provider tells us which team the code belongs to; the callback
/// request itself carries no team identity.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub team_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Client for the chat platform's OAuth and messaging endpoints.
///
/// Kept object-safe so tests can substitute a fake upstream and count calls.
#[async_trait]
pub trait ChatOAuth: Send + Sync {
    /// Authorization URL the installing user is redirected to.
    fn install_url(&self) -> String;

    /// Exchange an authorization code for the team's initial token pair.
    async fn exchange_code(&self, code: &str) -> Result<AuthGrant, AuthError>;

    /// Exchange a refresh token for a new token pair.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;

    /// Send a message to a channel (or user DM) on behalf of a team.
    async fn post_message(
        &self,
        access_token: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), AuthError>;
}
