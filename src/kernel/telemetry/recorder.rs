use std::sync::atomic::{AtomicU64, Ordering};

use super::metrics::{PerceptionStats, SafetyStats, SpeechStats, TelemetrySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    CycleCompleted,
    CycleSkipped,
    FrameDropped,
    CaptureFailed,
    DarkFrame,
    AnalysisFailed,
    HazardAnnounced,
    CompanionFiller,
    PathClear,
    StaleDiscard,
    WatchdogRestart,
    EmergencyEntered,
    EmergencyEscalated,
    EmergencyResolved,
    EmergencyCancelled,
}

const COUNTERS: usize = 15;

#[derive(Debug, Default)]
pub struct Telemetry {
    counts: [AtomicU64; COUNTERS],
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, counter: Counter) {
        self.counts[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            perception: PerceptionStats {
                cycles_completed: self.get(Counter::CycleCompleted),
                cycles_skipped: self.get(Counter::CycleSkipped),
                frames_dropped: self.get(Counter::FrameDropped),
                capture_failures: self.get(Counter::CaptureFailed),
                dark_frames: self.get(Counter::DarkFrame),
                analysis_failures: self.get(Counter::AnalysisFailed),
            },
            speech: SpeechStats {
                hazards_announced: self.get(Counter::HazardAnnounced),
                companion_fillers: self.get(Counter::CompanionFiller),
                path_clear_confirmations: self.get(Counter::PathClear),
            },
            safety: SafetyStats {
                watchdog_restarts: self.get(Counter::WatchdogRestart),
                emergencies_entered: self.get(Counter::EmergencyEntered),
                emergencies_escalated: self.get(Counter::EmergencyEscalated),
                emergencies_resolved: self.get(Counter::EmergencyResolved),
                emergencies_cancelled: self.get(Counter::EmergencyCancelled),
            },
            stale_discards: self.get(Counter::StaleDiscard),
        }
    }
}
