use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub u64);

/// One logical task. Superseded as soon as a newer interaction begins.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: InteractionId,
    pub token: CancellationToken,
}

impl Interaction {
    /// Runs `fut` until it completes or this interaction is superseded.
    /// Returns `None` when superseded, even if `fut` finished in the same poll.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        };
        if self.token.is_cancelled() {
            debug!(interaction = self.id.0, "discarding result of superseded interaction");
            return None;
        }
        output
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Issues monotonically increasing interaction ids. Beginning a new
/// interaction cancels the token of the previous one.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    current: AtomicU64,
    token: Mutex<CancellationToken>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Interaction {
        let mut slot = lock(&self.token);
        slot.cancel();
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = CancellationToken::new();
        debug!(interaction = id, "interaction began");
        Interaction {
            id: InteractionId(id),
            token: slot.clone(),
        }
    }

    pub fn is_current(&self, id: InteractionId) -> bool {
        self.current.load(Ordering::SeqCst) == id.0
    }

    /// Aborts the current interaction without starting a new one (shutdown).
    pub fn cancel_current(&self) {
        lock(&self.token).cancel();
    }
}
