use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cancel::Interaction;
use super::distress::normalize;
use super::event::{DistressEvent, DistressSource, Severity};
use super::reactor::Core;
use super::state::{Mode, SessionState, StateDelta};
use super::telemetry::Counter;
use crate::config::EmergencyConfig;
use crate::services::{Cue, ListenRequest, Vibration};

const FIRST_PROMPT: &str = "Are you okay? Say I'm okay if you're safe, or say help.";
const REPROMPT: &str = "I didn't hear you. Are you okay? Say I'm okay, or say help.";
const SAFE_REPLY: &str = "Glad you're okay. Carrying on.";
const ESCALATED: &str =
    "I've contacted emergency help and I'm sending your location. Press the button once you're safe.";
const CANCELLED: &str = "Okay, emergency cancelled.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencySession {
    pub severity: Severity,
    pub source: DistressSource,
    /// Verification attempts started so far (1-based once prompting begins).
    pub attempt: u32,
    /// Mode to return to once the emergency is resolved or cancelled.
    pub prior: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    Safe,
    Distress,
    NoResponse,
}

/// Classifies a verification reply. Distress words are checked first, so
/// "I'm not okay" escalates. Anything without a known token is no-response.
pub fn classify_reply(reply: Option<&str>, config: &EmergencyConfig) -> ReplyClass {
    let Some(reply) = reply else {
        return ReplyClass::NoResponse;
    };
    let words = normalize(reply);
    let words: Vec<&str> = words.split(' ').filter(|w| !w.is_empty()).collect();
    let has = |tokens: &[String]| {
        words
            .iter()
            .any(|w| tokens.iter().any(|t| t.eq_ignore_ascii_case(w)))
    };

    if has(&config.distress_tokens) {
        ReplyClass::Distress
    } else if has(&config.safe_tokens) {
        ReplyClass::Safe
    } else {
        ReplyClass::NoResponse
    }
}

/// How many times to ask, and how long to listen each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub attempts: u32,
    pub window: Duration,
}

impl VerificationPolicy {
    pub fn for_severity(severity: Severity, config: &EmergencyConfig) -> Self {
        Self {
            attempts: config.attempts_for(severity).max(1),
            window: config.window_for(severity),
        }
    }
}

/// Clears the emergency and returns to the mode active before it began.
pub(crate) fn leave_emergency(state: &mut SessionState) -> Mode {
    let prior = state
        .emergency()
        .map(|session| session.prior)
        .filter(|prior| *prior != Mode::Navigating || state.navigation().is_some())
        .unwrap_or_else(|| state.resting_mode());
    state.reduce(StateDelta::EmergencyCleared);
    state.reduce(StateDelta::ModeChanged(prior));
    prior
}

impl Core {
    /// Entry point for every distress signal, whatever its source.
    pub(crate) fn on_distress(self: &Arc<Self>, event: DistressEvent) {
        let started = self.update(|state| {
            let mode = state.mode();
            if mode.is_emergency() {
                return Err("emergency already in progress");
            }
            if mode == Mode::Listening && event.source != DistressSource::Fall {
                return Err("user is giving a command");
            }
            let interaction = self.registry.begin();
            let session = EmergencySession {
                severity: event.severity,
                source: event.source,
                attempt: 0,
                prior: state.resting_mode(),
            };
            state.reduce(StateDelta::EmergencyStarted(session));
            state.reduce(StateDelta::ModeChanged(Mode::EmergencyCheck));
            Ok(interaction)
        });

        let interaction = match started {
            Ok(interaction) => interaction,
            Err(reason) => {
                debug!(source = ?event.source, "distress ignored: {}", reason);
                return;
            }
        };

        warn!(source = ?event.source, severity = ?event.severity, "entering emergency check");
        self.telemetry.record(Counter::EmergencyEntered);
        self.arbiter.stop_speaking();
        self.services.listener.stop_listening();
        self.services.feedback.vibrate(Vibration::Alert);

        let policy = VerificationPolicy::for_severity(event.severity, &self.config.emergency);
        tokio::spawn(Arc::clone(self).run_verification(interaction, policy));
    }

    async fn run_verification(self: Arc<Self>, interaction: Interaction, policy: VerificationPolicy) {
        for attempt in 1..=policy.attempts {
            if !self.apply_if_current(&interaction, StateDelta::EmergencyAttempt(attempt)) {
                return;
            }
            let prompt = if attempt == 1 { FIRST_PROMPT } else { REPROMPT };
            if interaction.guard(self.arbiter.speak(prompt, true)).await.is_none() {
                return;
            }

            let request = ListenRequest {
                timeout: policy.window,
                silence_timeout: self.config.silence_timeout(),
            };
            let Some(reply) = self.listen_for(&interaction, request).await else {
                return;
            };
            let class = classify_reply(reply.as_deref(), &self.config.emergency);
            info!(attempt, ?class, "verification reply");

            match class {
                ReplyClass::Safe => return self.resolve_safe(&interaction),
                ReplyClass::Distress => return self.escalate(&interaction).await,
                ReplyClass::NoResponse => {}
            }
        }
        self.escalate(&interaction).await;
    }

    fn resolve_safe(self: &Arc<Self>, interaction: &Interaction) {
        let restored = self.update(|state| {
            if !self.registry.is_current(interaction.id) || state.mode() != Mode::EmergencyCheck {
                return None;
            }
            Some(leave_emergency(state))
        });
        if let Some(mode) = restored {
            info!(?mode, "user safe, emergency resolved");
            self.telemetry.record(Counter::EmergencyResolved);
            self.services.feedback.play_sound(Cue::Confirm);
            self.arbiter.say(SAFE_REPLY, true);
        }
    }

    async fn escalate(self: &Arc<Self>, interaction: &Interaction) {
        if !self.apply_if_current(interaction, StateDelta::ModeChanged(Mode::EmergencyActing)) {
            return;
        }
        let severity = self.read(|state| state.emergency().map(|s| s.severity));
        warn!(?severity, "escalating emergency");
        self.telemetry.record(Counter::EmergencyEscalated);
        self.services.feedback.play_sound(Cue::Alarm);
        self.services.feedback.vibrate(Vibration::Alert);
        self.arbiter.say(ESCALATED, true);

        // Dispatch itself is external; only whether a fix was attached is logged.
        if let Some(location) = self.locate(interaction).await {
            info!(with_location = location.is_some(), "emergency contact notified");
        }
    }

    /// A confirmation press during an emergency: back to the prior mode.
    pub(crate) fn cancel_emergency(self: &Arc<Self>) {
        let restored = self.update(|state| {
            if !state.mode().is_emergency() {
                return None;
            }
            self.registry.begin();
            Some(leave_emergency(state))
        });
        let Some(mode) = restored else { return };

        info!(?mode, "emergency cancelled by user");
        self.telemetry.record(Counter::EmergencyCancelled);
        self.services.listener.stop_listening();
        self.arbiter.stop_speaking();
        self.services.feedback.play_sound(Cue::Confirm);
        self.arbiter.say(CANCELLED, true);
    }
}
