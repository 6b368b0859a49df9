use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::arbiter::SpeechOutcome;
use super::reactor::Core;
use super::scheduler::pause;
use super::state::{Mode, StateDelta};
use crate::services::{Cue, Vibration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationPlan {
    #[serde(default)]
    pub id: PlanId,
    pub destination: String,
    /// Ordered instruction text, one entry per step.
    pub steps: Vec<String>,
    #[serde(default)]
    pub total_distance_m: f64,
    #[serde(default)]
    pub total_time_s: f64,
}

impl NavigationPlan {
    pub fn new(destination: impl Into<String>, steps: Vec<String>, total_distance_m: f64, total_time_s: f64) -> Self {
        Self {
            id: PlanId::new(),
            destination: destination.into(),
            steps,
            total_distance_m,
            total_time_s,
        }
    }

    pub fn summary(&self) -> String {
        let minutes = (self.total_time_s / 60.0).ceil().max(1.0) as u64;
        format!(
            "Route to {}: {} {}, about {} meters, roughly {} {}.",
            self.destination,
            self.steps.len(),
            if self.steps.len() == 1 { "step" } else { "steps" },
            self.total_distance_m.round() as u64,
            minutes,
            if minutes == 1 { "minute" } else { "minutes" },
        )
    }
}

/// What the narrator should do on a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarratorStep {
    /// Speech channel busy; retry the same step after the backoff.
    Backoff,
    Announce { index: usize, text: String },
    Arrived,
}

/// A plan plus a monotonic step cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationCursor {
    plan: NavigationPlan,
    step_index: usize,
}

impl NavigationCursor {
    pub fn new(plan: NavigationPlan) -> Self {
        Self { plan, step_index: 0 }
    }

    pub fn plan(&self) -> &NavigationPlan {
        &self.plan
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn is_complete(&self) -> bool {
        self.step_index >= self.plan.steps.len()
    }

    /// Pure function: (cursor, speech busy) -> next narrator step.
    pub fn tick(&self, speaking: bool) -> NarratorStep {
        if self.is_complete() {
            return NarratorStep::Arrived;
        }
        if speaking {
            return NarratorStep::Backoff;
        }
        NarratorStep::Announce {
            index: self.step_index,
            text: self.plan.steps[self.step_index].clone(),
        }
    }

    pub fn advance(&mut self) {
        if !self.is_complete() {
            self.step_index += 1;
        }
    }
}

impl Core {
    /// Runs while the session is `Navigating`. Any mode change cancels `token`.
    pub(crate) async fn run_narrator(self: Arc<Self>, token: CancellationToken) {
        debug!("navigation narrator started");
        let step_duration = self.config.navigation.step_duration();
        let backoff = self.config.navigation.busy_backoff();

        while !token.is_cancelled() {
            let speaking = self.arbiter.is_speaking();
            let tick = self.read(|state| {
                if state.mode() != Mode::Navigating {
                    return None;
                }
                state.navigation().map(|cursor| (cursor.plan().id, cursor.tick(speaking)))
            });
            let Some((plan, step)) = tick else { break };

            match step {
                NarratorStep::Backoff => {
                    debug!("speech busy, holding navigation step");
                    if !pause(&token, backoff).await {
                        break;
                    }
                }
                NarratorStep::Announce { index, text } => {
                    self.services.feedback.play_sound(Cue::for_instruction(&text));
                    let spoken = tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        outcome = self.arbiter.speak(text, false) => Some(outcome),
                    };
                    let Some(outcome) = spoken else { break };
                    if outcome == SpeechOutcome::Interrupted {
                        debug!(step = index, "instruction cut off, repeating");
                        if !pause(&token, backoff).await {
                            break;
                        }
                        continue;
                    }
                    debug!(step = index, ?outcome, "instruction spoken");
                    if !pause(&token, step_duration).await {
                        break;
                    }
                    self.apply(StateDelta::StepAdvanced { plan, from: index });
                }
                NarratorStep::Arrived => {
                    self.arrive(plan);
                    break;
                }
            }
        }
        debug!("navigation narrator exited");
    }

    fn arrive(self: &Arc<Self>, plan: PlanId) {
        let arrived = self.update(|state| {
            let destination = state
                .navigation()
                .filter(|cursor| cursor.plan().id == plan && cursor.is_complete())
                .map(|cursor| cursor.plan().destination.clone())?;
            if state.mode() != Mode::Navigating {
                return None;
            }
            state.reduce(StateDelta::PlanCleared);
            state.reduce(StateDelta::ModeChanged(state.resting_mode()));
            Some(destination)
        });

        if let Some(destination) = arrived {
            info!(%destination, "navigation complete");
            self.services.feedback.play_sound(Cue::Confirm);
            self.services.feedback.vibrate(Vibration::Double);
            self.arbiter.say(format!("You have arrived at {}.", destination), false);
        }
    }
}
