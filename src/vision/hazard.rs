use serde::{Deserialize, Serialize};

use crate::kernel::event::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardCategory {
    None,
    Obstacle,
    Vehicle,
    Stairs,
    Curb,
    Person,
    /// The wearer appears to have fallen.
    Fall,
    #[serde(other)]
    Other,
}

/// Per-frame hazard report. Consumed once by the perception loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub category: HazardCategory,
    pub severity: Severity,
    #[serde(default)]
    pub direction: String,
    /// Estimated distance in meters.
    #[serde(default)]
    pub distance: Option<f32>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub message: String,
}

impl Hazard {
    pub fn new(category: HazardCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            direction: String::new(),
            distance: None,
            confidence: 1.0,
            message: message.into(),
        }
    }

    pub fn clear() -> Self {
        Self::new(HazardCategory::None, Severity::Low, "")
    }

    pub fn is_fall(&self) -> bool {
        self.category == HazardCategory::Fall
    }

    /// Something worth interrupting the user for.
    pub fn is_actionable(&self) -> bool {
        self.category != HazardCategory::None && !self.message.trim().is_empty()
    }
}
