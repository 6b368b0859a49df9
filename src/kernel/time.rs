use std::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::lock;

/// Liveness stamp of the perception loop, read by the watchdog.
#[derive(Debug)]
pub struct Heartbeat {
    last: Mutex<Instant>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    pub fn stamp(&self) {
        *lock(&self.last) = Instant::now();
    }

    pub fn last(&self) -> Instant {
        *lock(&self.last)
    }

    pub fn elapsed(&self) -> Duration {
        self.last().elapsed()
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}
