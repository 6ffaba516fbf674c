//! HTTP router for teambot-auth.
//!
//! - /slack/install        — redirect to the Slack authorization page
//! - /slack/oauth_redirect — OAuth callback, completes the install
//! - /slack/command        — slash-command endpoint, sends a message
//! - /status               — health check

pub mod routes;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::SharedState;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router(state).layer(cors).layer(TraceLayer::new_for_http())
}
