use serde::{Deserialize, Serialize};

/// Everything the orchestrator drains from its queue. Background monitors and
/// loops never branch on shared mode flags; they post one of these instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The user's command button. Also serves as the confirmation press that
    /// cancels or resets an emergency.
    Trigger,
    Distress(DistressEvent),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistressSource {
    /// Keyword spotted in ambient speech.
    Keyword,
    /// Sudden loud sound.
    Loudness,
    /// Fall reported by the perception loop.
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistressEvent {
    pub source: DistressSource,
    pub severity: Severity,
}

impl DistressEvent {
    pub fn fall() -> Self {
        Self {
            source: DistressSource::Fall,
            severity: Severity::High,
        }
    }
}
