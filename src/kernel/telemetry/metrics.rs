use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub perception: PerceptionStats,
    pub speech: SpeechStats,
    pub safety: SafetyStats,
    pub stale_discards: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptionStats {
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    /// Cycles dropped because a capture/analyze was already in flight.
    pub frames_dropped: u64,
    pub capture_failures: u64,
    pub dark_frames: u64,
    pub analysis_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechStats {
    pub hazards_announced: u64,
    pub companion_fillers: u64,
    pub path_clear_confirmations: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyStats {
    pub watchdog_restarts: u64,
    pub emergencies_entered: u64,
    pub emergencies_escalated: u64,
    pub emergencies_resolved: u64,
    pub emergencies_cancelled: u64,
}
