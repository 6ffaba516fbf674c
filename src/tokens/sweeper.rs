//! Background token refresh sweeper.
//!
//! Runs every hour. Walks every team in the store and requests a valid
//! token, which refreshes any expired record as a side effect. One team's
//! failure never stops the sweep for the rest.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::tokens::TokenManager;

/// Time between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Run the sweep loop until the shutdown signal flips.
pub async fn run(
    manager: Arc<TokenManager>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Token refresh sweeper started (interval: {}s)", interval.as_secs());

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = sweep(&manager).await {
                    error!("Sweep aborted: {e}");
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender means the rest of the process is gone.
                if changed.is_err() || *shutdown.borrow() {
                    info!("Token refresh sweeper stopped");
                    return;
                }
            }
        }
    }
}

/// One pass over every known team.
///
/// Errors from individual teams are logged and swallowed; only a store read
/// failure (no team list at all) aborts the tick.
pub async fn sweep(manager: &TokenManager) -> Result<(), crate::error::AuthError> {
    let team_ids = manager.store().team_ids().await?;

    for team_id in team_ids {
        if let Err(e) = manager.get_valid_token(&team_id).await {
            warn!("Sweep: could not ensure token for team {team_id}: {e}");
        }
    }

    Ok(())
}
