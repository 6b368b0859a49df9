use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::reactor::Core;
use super::state::Mode;
use super::telemetry::Counter;

/// Pure liveness check. The perception loop is only expected to be alive
/// while walking is on and the session is actually moving.
pub fn needs_restart(mode: Mode, walking_active: bool, loop_running: bool, stalled_for: Duration, threshold: Duration) -> bool {
    if !walking_active || !mode.is_moving() {
        return false;
    }
    !loop_running || stalled_for > threshold
}

impl Core {
    pub(crate) async fn run_watchdog(self: Arc<Self>, token: CancellationToken) {
        let period = self.config.watchdog.interval();
        let threshold = self.config.watchdog.stall_threshold();
        info!(?period, "watchdog started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let (mode, walking_active) = self.read(|state| (state.mode(), state.walking_active()));
            let stalled_for = self.heartbeat.elapsed();
            if needs_restart(mode, walking_active, self.perception_running(), stalled_for, threshold) {
                warn!(?stalled_for, "perception loop stalled, restarting");
                self.restart_perception();
                self.telemetry.record(Counter::WatchdogRestart);
                self.arbiter.say(self.config.watchdog.restart_notice.clone(), true);
            }
        }
        info!("watchdog stopped");
    }
}
