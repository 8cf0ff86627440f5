//! Opponent poller.
//!
//! While our lobby waits for an opponent a background task asks the backend
//! every `poll_interval` whether the lobby filled. It gives up after
//! `poll_max_time`, cancelling the lobby on the way out.

use super::controller::Shared;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

pub(crate) const ALERT_TIMEOUT: &str = "Search timeout. No opponent found. Please try again.";

/// Owns the polling task; dropping the handle aborts it
pub(crate) struct PollHandle {
    game_id: String,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub(crate) fn game_id(&self) -> &str {
        &self.game_id
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling for an opponent in `game_id`
pub(crate) fn spawn(shared: Arc<Shared>, game_id: String) -> PollHandle {
    let task = tokio::spawn(run(shared, game_id.clone()));
    PollHandle { game_id, task }
}

async fn run(shared: Arc<Shared>, game_id: String) {
    let max_time = shared.config.poll_max_time;
    debug!(
        "Polling game {} every {:?} for up to {:?}",
        game_id, shared.config.poll_interval, max_time
    );

    match time::timeout(max_time, watch(&shared, &game_id)).await {
        Ok(()) => {}
        Err(_) => timed_out(&shared, &game_id).await,
    }
}

/// Tick until the lobby fills or the search stops being ours
async fn watch(shared: &Shared, game_id: &str) {
    let period = shared.config.poll_interval.max(Duration::from_millis(1));
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if !shared.is_searching_for(game_id) {
            debug!("Search for {} ended, poller exiting", game_id);
            return;
        }

        match shared.api.check_match(&shared.user.id, game_id).await {
            Ok(response) if response.status == 200 => {
                if response.data.as_bool() == Some(true) {
                    shared.opponent_joined(game_id);
                    return;
                }
            }
            Ok(response) => {
                warn!("Match check for {} answered {}", game_id, response.status);
            }
            Err(e) => {
                warn!("Match check for {} failed: {}", game_id, e);
            }
        }
    }
}

async fn timed_out(shared: &Shared, game_id: &str) {
    if !shared.is_searching_for(game_id) {
        return;
    }
    info!("No opponent for {} within {:?}", game_id, shared.config.poll_max_time);

    match shared.api.cancel_search(&shared.user.id, game_id).await {
        Ok(response) if response.status == 200 => {}
        Ok(response) => warn!("Cancel after timeout answered {}", response.status),
        Err(e) => warn!("Cancel after timeout failed: {}", e),
    }

    if shared.abandon_search(game_id) {
        shared.host.show_alert(ALERT_TIMEOUT);
    }
}
