use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Describe,
    ReadText,
    SafetyCheck,
    WhereAmI,
    Navigate,
    StopNavigation,
    WalkingOn,
    WalkingOff,
    CompanionOn,
    CompanionOff,
    #[serde(other)]
    Unknown,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::Describe => "describe",
            IntentKind::ReadText => "read_text",
            IntentKind::SafetyCheck => "safety_check",
            IntentKind::WhereAmI => "where_am_i",
            IntentKind::Navigate => "navigate",
            IntentKind::StopNavigation => "stop_navigation",
            IntentKind::WalkingOn => "walking_on",
            IntentKind::WalkingOff => "walking_off",
            IntentKind::CompanionOn => "companion_on",
            IntentKind::CompanionOff => "companion_off",
            IntentKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub detail_level: Option<DetailLevel>,
}

impl ClassifiedIntent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            destination: None,
            detail_level: None,
        }
    }

    pub fn navigate(destination: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Navigate,
            destination: Some(destination.into()),
            detail_level: None,
        }
    }
}
