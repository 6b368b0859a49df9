use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A background loop (perception, narrator, watchdog, distress monitor) with
/// its own cancellation handle. Stopping a loop is one call, not a flag read at
/// the top of the next tick.
#[derive(Debug)]
pub struct LoopHandle {
    name: &'static str,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Spawns `body` with a child of `parent`, so cancelling the parent stops
    /// every loop at once.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let task = tokio::spawn(body(token.clone()));
        debug!(task = name, "loop spawned");
        Self { name, token, task }
    }

    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!(task = self.name, "loop stopped");
            self.token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Sleeps for `duration` unless `token` fires first. Returns `false` when
/// cancelled.
pub async fn pause(token: &CancellationToken, duration: std::time::Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
