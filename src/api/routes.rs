//! Route handlers. All handlers receive `SharedState` via Axum state
//! extraction; failures map to HTTP responses through `AuthError`.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AuthError;
use crate::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/slack/install", get(install))
        .route("/slack/oauth_redirect", get(oauth_redirect))
        .route("/slack/command", post(command))
        .with_state(state)
}

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "teambot-auth",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /slack/install — send the user to Slack's authorization page.
async fn install(State(state): State<SharedState>) -> Redirect {
    Redirect::temporary(&state.chat.install_url())
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// GET /slack/oauth_redirect — handle the OAuth callback.
///
/// Exchange failures are shown to the installing user verbatim; they are
/// actionable (an expired code, a misconfigured app).
async fn oauth_redirect(
    State(state): State<SharedState>,
    Query(q): Query<CallbackQuery>,
) -> Result<&'static str, AuthError> {
    let code = q
        .code
        .ok_or_else(|| AuthError::BadRequest("missing authorization code".into()))?;

    state.manager.complete_authorization(&code).await?;

    Ok("Slack app installed successfully!")
}

#[derive(Deserialize)]
struct CommandPayload {
    team_id: String,
    user_id: String,
}

/// POST /slack/command — slash-command endpoint.
///
/// Any token-class failure comes back as a 401 with a generic body; the
/// underlying cause stays in the logs.
async fn command(
    State(state): State<SharedState>,
    Form(payload): Form<CommandPayload>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let token = state.manager.get_valid_token(&payload.team_id).await?;

    state
        .chat
        .post_message(&token, &payload.user_id, "Hello from your Slack bot!")
        .await?;

    Ok(Json(json!({
        "response_type": "in_channel",
        "text": "Message sent!",
    })))
}
