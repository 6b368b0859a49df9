use std::time::Duration;

use tokio::time::Instant;

/// Sudden-loud-sound detector over raw `f32` sample chunks.
/// Signal analysis only, no recognition.
pub struct AmplitudeMonitor {
    // Configuration
    threshold: f32,
    debounce: Duration,

    // State
    last_trigger: Option<Instant>,
}

impl AmplitudeMonitor {
    pub fn new(threshold: f32, debounce: Duration) -> Self {
        Self {
            threshold,
            debounce,
            last_trigger: None,
        }
    }

    /// Peak absolute amplitude of a chunk.
    pub fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |peak, &x| peak.max(x.abs()))
    }

    /// Process a chunk of samples captured at `now`.
    /// Returns true when the chunk counts as a new loud-sound trigger.
    pub fn process(&mut self, samples: &[f32], now: Instant) -> bool {
        if samples.is_empty() {
            return false;
        }
        if Self::peak(samples) <= self.threshold {
            return false;
        }

        // Debounce: one trigger per window, later peaks inside it are ignored
        if let Some(last) = self.last_trigger {
            if now.duration_since(last) < self.debounce {
                return false;
            }
        }
        self.last_trigger = Some(now);
        true
    }
}
