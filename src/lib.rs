pub mod api;
pub mod config;
pub mod error;
pub mod providers;
pub mod store;
pub mod tokens;

pub use config::Config;
pub use error::AuthError;

use std::sync::Arc;

use providers::ChatOAuth;
use tokens::TokenManager;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub chat: Arc<dyn ChatOAuth>,
    pub manager: Arc<TokenManager>,
}

pub type SharedState = Arc<AppState>;
