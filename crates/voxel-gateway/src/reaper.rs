use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::app::AppState;

/// Periodically drop game sessions that have had no live connection for
/// `sessions.idle_ttl_secs`. Stops when the hub is gone.
pub fn spawn(state: Arc<AppState>) -> JoinHandle<()> {
    let ttl = state.config.sessions.idle_ttl();
    let period = state.config.sessions.reap_interval();

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match state.sessions.reap_vacant(ttl).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "session reaper pass"),
                Err(e) => {
                    warn!(error = %e, "session reaper stopping");
                    break;
                }
            }
        }
    })
}
