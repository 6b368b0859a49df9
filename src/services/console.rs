//! Simulated collaborators for running the orchestrator from a terminal.
//! Speech is printed, transcripts come from stdin, the camera is synthetic and
//! the models are answered offline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use super::{
    Camera, CaptureOptions, Coordinates, Cue, Directions, Feedback, ListenRequest, Location, ServiceError, Services,
    SpeechInput, SpeechOutput, Vibration, Vision,
};
use crate::intent::{fallback, ClassifiedIntent, IntentKind};
use crate::kernel::event::Severity;
use crate::kernel::lock;
use crate::kernel::navigation::NavigationPlan;
use crate::vision::{Frame, Hazard, HazardCategory};

/// Prints utterances and holds the channel for a per-word duration.
pub struct ConsoleSpeech {
    per_word: Duration,
}

impl ConsoleSpeech {
    pub fn new(per_word: Duration) -> Self {
        Self { per_word }
    }
}

#[async_trait]
impl SpeechOutput for ConsoleSpeech {
    async fn speak(&self, text: &str) -> Result<(), ServiceError> {
        println!("[SAY] {}", text);
        let words = text.split_whitespace().count().max(1) as u32;
        tokio::time::sleep(self.per_word * words).await;
        Ok(())
    }

    fn stop(&self) {
        debug!("speech cut off");
    }
}

/// Transcripts typed on stdin, delivered to whoever is listening.
pub struct ConsoleListener {
    transcripts: tokio::sync::Mutex<mpsc::Receiver<String>>,
    interrupt: Notify,
}

impl ConsoleListener {
    pub fn new(transcripts: mpsc::Receiver<String>) -> Self {
        Self {
            transcripts: tokio::sync::Mutex::new(transcripts),
            interrupt: Notify::new(),
        }
    }
}

#[async_trait]
impl SpeechInput for ConsoleListener {
    async fn listen(&self, request: ListenRequest) -> Result<Option<String>, ServiceError> {
        println!("[MIC] listening ({}s)...", request.timeout.as_secs());
        let mut transcripts = self.transcripts.lock().await;
        tokio::select! {
            _ = self.interrupt.notified() => Ok(None),
            heard = tokio::time::timeout(request.timeout, transcripts.recv()) => match heard {
                Ok(Some(text)) => Ok(Some(text)),
                Ok(None) => Err(ServiceError::Unavailable("stdin closed".into())),
                Err(_) => Ok(None),
            },
        }
    }

    fn stop_listening(&self) {
        self.interrupt.notify_waiters();
    }
}

/// Uniform gray frames at a configurable brightness.
pub struct SyntheticCamera {
    brightness: u8,
}

impl SyntheticCamera {
    pub fn new(brightness: u8) -> Self {
        Self { brightness }
    }
}

#[async_trait]
impl Camera for SyntheticCamera {
    async fn capture(&self, options: CaptureOptions) -> Result<Frame, ServiceError> {
        if !options.silent {
            println!("[CAMERA] click");
        }
        let (width, height) = if options.low_res { (160, 120) } else { (640, 480) };
        let level = self.brightness;
        let buffer = ImageBuffer::from_pixel(width, height, Rgb([level, level, level]));
        Ok(Frame::new(DynamicImage::ImageRgb8(buffer)))
    }
}

/// Keyword intents, canned narration, and the occasional synthetic obstacle.
pub struct OfflineVision {
    hazard_probability: f64,
    rng: Mutex<StdRng>,
}

impl OfflineVision {
    pub fn new(hazard_probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            hazard_probability,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl Vision for OfflineVision {
    async fn classify_intent(&self, transcript: &str) -> Result<ClassifiedIntent, ServiceError> {
        Ok(fallback::classify(transcript))
    }

    async fn analyze_image(
        &self,
        _frame: &Frame,
        intent: IntentKind,
        location: Option<Coordinates>,
    ) -> Result<String, ServiceError> {
        let text = match intent {
            IntentKind::ReadText => "I don't see any text in front of you.".to_string(),
            IntentKind::SafetyCheck => "The way ahead looks clear.".to_string(),
            IntentKind::WhereAmI => match location {
                Some(c) => format!(
                    "You're near latitude {:.4}, longitude {:.4}. It looks like a quiet street.",
                    c.latitude, c.longitude
                ),
                None => "I couldn't get your position, but it looks like a quiet street.".to_string(),
            },
            _ => "A plain gray wall, evenly lit.".to_string(),
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(text)
    }

    async fn analyze_walking_safety(&self, _frame: &Frame) -> Result<Option<Hazard>, ServiceError> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let hit = {
            let p = self.hazard_probability.clamp(0.0, 1.0);
            lock(&self.rng).gen_bool(p)
        };
        Ok(hit.then(|| {
            let mut hazard = Hazard::new(HazardCategory::Obstacle, Severity::Medium, "Obstacle ahead, step left.");
            hazard.direction = "ahead".to_string();
            hazard.distance = Some(2.0);
            hazard
        }))
    }
}

/// A fixed three-step route to any destination.
pub struct OfflineDirections;

#[async_trait]
impl Directions for OfflineDirections {
    async fn walking_directions(
        &self,
        destination: &str,
        _origin: Option<Coordinates>,
    ) -> Result<Option<NavigationPlan>, ServiceError> {
        let steps = vec![
            "Head north for 50 meters.".to_string(),
            "Turn left onto the main road.".to_string(),
            format!("Continue 100 meters, {} is on your right.", destination),
        ];
        Ok(Some(NavigationPlan::new(destination, steps, 150.0, 120.0)))
    }
}

pub struct ConsoleFeedback;

impl Feedback for ConsoleFeedback {
    fn play_sound(&self, cue: Cue) {
        println!("[CUE] {:?}", cue);
    }

    fn vibrate(&self, pattern: Vibration) {
        println!("[BUZZ] {:?}", pattern);
    }
}

pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl Location for FixedLocation {
    async fn current_location(&self, _timeout: Duration) -> Result<Coordinates, ServiceError> {
        Ok(self.0)
    }
}

/// Wires every offline collaborator together. `vision` and `directions`
/// may be swapped for a real model client by the caller.
pub fn offline_services(transcripts: mpsc::Receiver<String>, seed: Option<u64>) -> Services {
    Services {
        speech: Arc::new(ConsoleSpeech::new(Duration::from_millis(250))),
        listener: Arc::new(ConsoleListener::new(transcripts)),
        camera: Arc::new(SyntheticCamera::new(128)),
        vision: Arc::new(OfflineVision::new(0.02, seed)),
        directions: Arc::new(OfflineDirections),
        feedback: Arc::new(ConsoleFeedback),
        location: Arc::new(FixedLocation(Coordinates {
            latitude: 51.5007,
            longitude: -0.1246,
            accuracy_m: Some(10.0),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dark_camera_produces_dark_frames() {
        let camera = SyntheticCamera::new(5);
        let frame = camera
            .capture(CaptureOptions {
                low_res: true,
                silent: true,
            })
            .await
            .expect("synthetic capture");
        assert_eq!(frame.dimensions(), (160, 120));
        assert!(frame.is_dark(15.0));
    }

    #[tokio::test(start_paused = true)]
    async fn listener_times_out_to_silence() {
        let (_tx, rx) = mpsc::channel(1);
        let listener = ConsoleListener::new(rx);
        let heard = listener
            .listen(ListenRequest {
                timeout: Duration::from_secs(1),
                silence_timeout: Duration::from_millis(500),
            })
            .await;
        assert_eq!(heard, Ok(None));
    }

    #[tokio::test]
    async fn offline_route_has_steps() {
        let plan = OfflineDirections
            .walking_directions("the park", None)
            .await
            .expect("offline route")
            .expect("a plan");
        assert_eq!(plan.destination, "the park");
        assert_eq!(plan.steps.len(), 3);
    }
}
