//! Capability interfaces for the orchestrator's external collaborators.
//!
//! The orchestrator never talks to a device or model directly. Speech
//! synthesis, speech recognition, the camera, the vision and intent models,
//! routing, haptics and positioning are all reached through these traits.

pub mod console;
pub mod error;
pub mod model;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::intent::{ClassifiedIntent, IntentKind};
use crate::kernel::navigation::NavigationPlan;
use crate::vision::{Frame, Hazard};

pub use error::ServiceError;
pub use retry::{retry_with_backoff, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenRequest {
    pub timeout: Duration,
    /// Stop once no new partial result has arrived for this long.
    pub silence_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub low_res: bool,
    /// Suppress the shutter sound.
    pub silent: bool,
}

/// Non-speech audio cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Listening,
    Confirm,
    Error,
    Alarm,
    TurnLeft,
    TurnRight,
    Straight,
}

impl Cue {
    /// Directional cue for a navigation instruction.
    pub fn for_instruction(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("left") {
            Cue::TurnLeft
        } else if text.contains("right") {
            Cue::TurnRight
        } else {
            Cue::Straight
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vibration {
    Tap,
    Double,
    Alert,
}

#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Resolves when the utterance has finished playing.
    async fn speak(&self, text: &str) -> Result<(), ServiceError>;
    /// Cuts off whatever is playing. Must not block.
    fn stop(&self);
}

#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// `Ok(None)` means silence until the timeout.
    async fn listen(&self, request: ListenRequest) -> Result<Option<String>, ServiceError>;
    fn stop_listening(&self);
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn capture(&self, options: CaptureOptions) -> Result<Frame, ServiceError>;
}

#[async_trait]
pub trait Vision: Send + Sync {
    async fn classify_intent(&self, transcript: &str) -> Result<ClassifiedIntent, ServiceError>;
    async fn analyze_image(
        &self,
        frame: &Frame,
        intent: IntentKind,
        location: Option<Coordinates>,
    ) -> Result<String, ServiceError>;
    async fn analyze_walking_safety(&self, frame: &Frame) -> Result<Option<Hazard>, ServiceError>;
}

#[async_trait]
pub trait Directions: Send + Sync {
    async fn walking_directions(
        &self,
        destination: &str,
        origin: Option<Coordinates>,
    ) -> Result<Option<NavigationPlan>, ServiceError>;
}

pub trait Feedback: Send + Sync {
    fn play_sound(&self, cue: Cue);
    fn vibrate(&self, pattern: Vibration);
}

#[async_trait]
pub trait Location: Send + Sync {
    async fn current_location(&self, timeout: Duration) -> Result<Coordinates, ServiceError>;
}

/// The full set of collaborators handed to the orchestrator.
#[derive(Clone)]
pub struct Services {
    pub speech: Arc<dyn SpeechOutput>,
    pub listener: Arc<dyn SpeechInput>,
    pub camera: Arc<dyn Camera>,
    pub vision: Arc<dyn Vision>,
    pub directions: Arc<dyn Directions>,
    pub feedback: Arc<dyn Feedback>,
    pub location: Arc<dyn Location>,
}
