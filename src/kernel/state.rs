use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::emergency::EmergencySession;
use super::navigation::{NavigationCursor, NavigationPlan, PlanId};

/// Top-level activity of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Idle,
    Listening,
    ProcessingIntent,
    Capturing,
    Analyzing,
    Speaking,
    Walking,
    Navigating,
    EmergencyCheck,
    EmergencyActing,
    Error,
}

impl Mode {
    pub fn is_emergency(self) -> bool {
        matches!(self, Mode::EmergencyCheck | Mode::EmergencyActing)
    }

    /// Modes in which the perception loop does real work.
    pub fn is_moving(self) -> bool {
        matches!(self, Mode::Walking | Mode::Navigating)
    }
}

/// Strict state delta. This is the ONLY way session state mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    ModeChanged(Mode),
    WalkingToggled(bool),
    CompanionToggled { enabled: bool, at: Instant },
    CompanionSpoke(Instant),
    PlanInstalled(NavigationPlan),
    StepAdvanced { plan: PlanId, from: usize },
    PlanCleared,
    EmergencyStarted(EmergencySession),
    EmergencyAttempt(u32),
    EmergencyCleared,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    mode: Mode,
    walking_active: bool,
    navigating: bool,
    companion_mode: bool,
    last_companion_message: Instant,
    navigation: Option<NavigationCursor>,
    emergency: Option<EmergencySession>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            walking_active: false,
            navigating: false,
            companion_mode: false,
            last_companion_message: Instant::now(),
            navigation: None,
            emergency: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure reduction: State + Delta -> Mutated State.
    /// Keeps `navigating ⇒ walking_active` for every delta.
    pub fn reduce(&mut self, delta: StateDelta) {
        match delta {
            StateDelta::ModeChanged(mode) => {
                if mode == Mode::Navigating {
                    self.walking_active = true;
                }
                self.mode = mode;
            }
            StateDelta::WalkingToggled(enabled) => {
                self.walking_active = enabled;
                if !enabled {
                    // Navigation cannot outlive walking.
                    self.navigating = false;
                    self.navigation = None;
                }
            }
            StateDelta::CompanionToggled { enabled, at } => {
                self.companion_mode = enabled;
                self.last_companion_message = at;
            }
            StateDelta::CompanionSpoke(at) => {
                self.last_companion_message = at;
            }
            StateDelta::PlanInstalled(plan) => {
                self.navigation = Some(NavigationCursor::new(plan));
                self.navigating = true;
                self.walking_active = true;
            }
            StateDelta::StepAdvanced { plan, from } => {
                if let Some(cursor) = self.navigation.as_mut() {
                    if cursor.plan().id == plan && cursor.step_index() == from {
                        cursor.advance();
                    }
                }
            }
            StateDelta::PlanCleared => {
                self.navigation = None;
                self.navigating = false;
            }
            StateDelta::EmergencyStarted(session) => {
                self.emergency = Some(session);
            }
            StateDelta::EmergencyAttempt(attempt) => {
                if let Some(session) = self.emergency.as_mut() {
                    session.attempt = attempt;
                }
            }
            StateDelta::EmergencyCleared => {
                self.emergency = None;
            }
        }
    }

    /// The mode the session settles into once no interaction is running.
    pub fn resting_mode(&self) -> Mode {
        if self.navigating && self.navigation.is_some() {
            Mode::Navigating
        } else if self.walking_active {
            Mode::Walking
        } else {
            Mode::Idle
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn walking_active(&self) -> bool {
        self.walking_active
    }

    pub fn navigating(&self) -> bool {
        self.navigating
    }

    pub fn companion_mode(&self) -> bool {
        self.companion_mode
    }

    pub fn last_companion_message(&self) -> Instant {
        self.last_companion_message
    }

    pub fn navigation(&self) -> Option<&NavigationCursor> {
        self.navigation.as_ref()
    }

    pub fn emergency(&self) -> Option<&EmergencySession> {
        self.emergency.as_ref()
    }
}
