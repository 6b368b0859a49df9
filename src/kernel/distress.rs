use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::audio::AmplitudeMonitor;
use super::event::{DistressEvent, DistressSource, Event, Severity};
use super::reactor::Core;
use crate::config::DistressConfig;

/// Raw input from the always-on ambient listener.
#[derive(Debug, Clone, PartialEq)]
pub enum AmbientSignal {
    /// Recognized ambient speech.
    Speech(String),
    /// A chunk of microphone samples in -1.0..=1.0.
    Samples(Vec<f32>),
}

/// Whole-word phrase matcher for distress vocabulary.
#[derive(Debug, Clone)]
pub struct KeywordSpotter {
    high: Vec<String>,
    medium: Vec<String>,
}

impl KeywordSpotter {
    pub fn new(config: &DistressConfig) -> Self {
        Self {
            high: config.high_phrases.iter().map(|p| normalize(p)).collect(),
            medium: config.medium_phrases.iter().map(|p| normalize(p)).collect(),
        }
    }

    /// High-severity phrases win over medium ones in the same utterance.
    pub fn detect(&self, text: &str) -> Option<Severity> {
        let padded = format!(" {} ", normalize(text));
        let hit = |phrases: &[String]| {
            phrases
                .iter()
                .filter(|p| !p.is_empty())
                .any(|p| padded.contains(&format!(" {} ", p)))
        };
        if hit(&self.high) {
            Some(Severity::High)
        } else if hit(&self.medium) {
            Some(Severity::Medium)
        } else {
            None
        }
    }
}

/// Lowercase words separated by single spaces. Apostrophes stay, so "i'm" is one word.
pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Both ambient sources behind one classifier.
pub struct DistressMonitor {
    spotter: KeywordSpotter,
    amplitude: AmplitudeMonitor,
}

impl DistressMonitor {
    pub fn new(config: &DistressConfig) -> Self {
        Self {
            spotter: KeywordSpotter::new(config),
            amplitude: AmplitudeMonitor::new(config.amplitude_threshold, config.amplitude_debounce()),
        }
    }

    pub fn observe(&mut self, signal: &AmbientSignal, now: Instant) -> Option<DistressEvent> {
        match signal {
            AmbientSignal::Speech(text) => self.spotter.detect(text).map(|severity| DistressEvent {
                source: DistressSource::Keyword,
                severity,
            }),
            AmbientSignal::Samples(samples) => self.amplitude.process(samples, now).then_some(DistressEvent {
                source: DistressSource::Loudness,
                severity: Severity::Medium,
            }),
        }
    }
}

impl Core {
    /// Drains ambient signals and posts distress events onto the orchestrator queue.
    /// Never looks at the session mode; filtering happens when the event is handled.
    pub(crate) async fn run_distress_monitor(
        self: Arc<Self>,
        mut signals: mpsc::Receiver<AmbientSignal>,
        token: CancellationToken,
    ) {
        info!("distress monitor started");
        let mut monitor = DistressMonitor::new(&self.config.distress);
        loop {
            let signal = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                signal = signals.recv() => signal,
            };
            let Some(signal) = signal else {
                debug!("ambient source closed");
                break;
            };
            if let Some(event) = monitor.observe(&signal, Instant::now()) {
                debug!(source = ?event.source, severity = ?event.severity, "distress signal");
                if self.events.send(Event::Distress(event)).await.is_err() {
                    warn!("event queue closed, distress monitor exiting");
                    break;
                }
            }
        }
        info!("distress monitor stopped");
    }
}
