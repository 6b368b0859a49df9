use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::kernel::event::Severity;
use crate::services::RetryPolicy;

/// Every timing and heuristic threshold the orchestrator uses.
/// Missing fields in a config file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Trigger presses closer together than this are ignored.
    pub trigger_debounce_ms: u64,
    pub listen_timeout_ms: u64,
    pub silence_timeout_ms: u64,
    /// Shorter transcripts are rejected with a retry prompt.
    pub min_transcript_chars: usize,
    /// Delay before a transient `Error` mode restores the resting mode.
    pub error_restore_ms: u64,
    pub geolocation_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub perception: PerceptionConfig,
    pub navigation: NavigationConfig,
    pub watchdog: WatchdogConfig,
    pub emergency: EmergencyConfig,
    pub distress: DistressConfig,
    /// Fixed seed for filler selection; entropy when absent.
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub cadence_ms: u64,
    pub capture_retry_delay_ms: u64,
    /// Mean luma (0-255) below which a frame is discarded.
    pub min_brightness: f32,
    pub companion_interval_ms: u64,
    pub path_clear_probability: f64,
    pub path_clear_message: String,
    pub companion_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Estimated walking time of one route step.
    pub step_duration_ms: u64,
    /// Retry delay when the speech channel is busy at tick time.
    pub busy_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub interval_ms: u64,
    pub stall_threshold_ms: u64,
    pub restart_notice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    pub high_attempts: u32,
    pub high_window_ms: u64,
    pub default_attempts: u32,
    pub default_window_ms: u64,
    pub safe_tokens: Vec<String>,
    pub distress_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistressConfig {
    pub high_phrases: Vec<String>,
    pub medium_phrases: Vec<String>,
    /// Peak absolute sample amplitude (0.0 - 1.0) counted as a sudden loud sound.
    pub amplitude_threshold: f32,
    pub amplitude_debounce_ms: u64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            trigger_debounce_ms: 300,
            listen_timeout_ms: 45_000,
            silence_timeout_ms: 2_500,
            min_transcript_chars: 2,
            error_restore_ms: 2_000,
            geolocation_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            perception: PerceptionConfig::default(),
            navigation: NavigationConfig::default(),
            watchdog: WatchdogConfig::default(),
            emergency: EmergencyConfig::default(),
            distress: DistressConfig::default(),
            rng_seed: None,
        }
    }
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 100,
            capture_retry_delay_ms: 250,
            min_brightness: 15.0,
            companion_interval_ms: 15_000,
            path_clear_probability: 0.05,
            path_clear_message: "Path is clear.".to_string(),
            companion_phrases: strings(&[
                "I'm right here with you.",
                "You're doing great.",
                "Still watching the path for you.",
                "Nice steady pace.",
                "All good so far.",
                "I'll let you know if anything comes up.",
                "Keep going, I've got your back.",
                "Looking good ahead.",
            ]),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            step_duration_ms: 14_000,
            busy_backoff_ms: 3_000,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            stall_threshold_ms: 2_000,
            restart_notice: "Safety monitor restarted. I'm watching the path again.".to_string(),
        }
    }
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            high_attempts: 1,
            high_window_ms: 20_000,
            default_attempts: 2,
            default_window_ms: 30_000,
            safe_tokens: strings(&["ok", "okay", "fine", "good", "safe", "yes", "alright"]),
            distress_tokens: strings(&["no", "not", "help", "hurt", "pain", "call"]),
        }
    }
}

impl Default for DistressConfig {
    fn default() -> Self {
        Self {
            high_phrases: strings(&["help", "emergency", "call 911", "call an ambulance", "save me", "sos"]),
            medium_phrases: strings(&["ouch", "i fell", "fell down", "it hurts", "i'm hurt", "pain", "can't get up", "dizzy"]),
            amplitude_threshold: 0.85,
            amplitude_debounce_ms: 5_000,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid orchestrator config")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn trigger_debounce(&self) -> Duration {
        Duration::from_millis(self.trigger_debounce_ms)
    }

    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    pub fn error_restore(&self) -> Duration {
        Duration::from_millis(self.error_restore_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}

impl PerceptionConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn capture_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capture_retry_delay_ms)
    }

    pub fn companion_interval(&self) -> Duration {
        Duration::from_millis(self.companion_interval_ms)
    }
}

impl NavigationConfig {
    pub fn step_duration(&self) -> Duration {
        Duration::from_millis(self.step_duration_ms)
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_millis(self.busy_backoff_ms)
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }
}

impl EmergencyConfig {
    pub fn attempts_for(&self, severity: Severity) -> u32 {
        match severity {
            Severity::High => self.high_attempts,
            Severity::Medium | Severity::Low => self.default_attempts,
        }
    }

    pub fn window_for(&self, severity: Severity) -> Duration {
        Duration::from_millis(match severity {
            Severity::High => self.high_window_ms,
            Severity::Medium | Severity::Low => self.default_window_ms,
        })
    }
}

impl DistressConfig {
    pub fn amplitude_debounce(&self) -> Duration {
        Duration::from_millis(self.amplitude_debounce_ms)
    }
}
