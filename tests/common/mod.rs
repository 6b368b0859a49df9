#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pathsense::intent::{fallback, ClassifiedIntent, IntentKind};
use pathsense::kernel::distress::AmbientSignal;
use pathsense::kernel::navigation::NavigationPlan;
use pathsense::services::{
    Camera, CaptureOptions, Coordinates, Cue, Directions, Feedback, ListenRequest, Location, ServiceError, Services,
    SpeechInput, SpeechOutput, Vibration, Vision,
};
use pathsense::vision::{Frame, Hazard};
use pathsense::{Orchestrator, OrchestratorConfig, OrchestratorHandle};

pub const UTTERANCE: Duration = Duration::from_millis(200);
pub const ANSWER_DELAY: Duration = Duration::from_millis(500);

// === Speech out ===

pub struct FakeSpeech {
    spoken: Mutex<Vec<(Instant, String)>>,
    pub stops: AtomicU32,
    /// How long each utterance plays.
    pub utterance: Mutex<Duration>,
}

impl Default for FakeSpeech {
    fn default() -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            stops: AtomicU32::new(0),
            utterance: Mutex::new(UTTERANCE),
        }
    }
}

impl FakeSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn spoken_at(&self) -> Vec<(Instant, String)> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn said(&self, needle: &str) -> bool {
        self.spoken().iter().any(|t| t.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.spoken().iter().filter(|t| t.contains(needle)).count()
    }
}

#[async_trait]
impl SpeechOutput for FakeSpeech {
    async fn speak(&self, text: &str) -> Result<(), ServiceError> {
        self.spoken.lock().unwrap().push((Instant::now(), text.to_string()));
        let length = *self.utterance.lock().unwrap();
        tokio::time::sleep(length).await;
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// === Speech in ===

/// Each `listen` pops one scripted answer; an empty script means silence
/// until the requested timeout.
#[derive(Default)]
pub struct FakeListener {
    script: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Duration>>,
    interrupt: Notify,
    pub stops: AtomicU32,
    /// A wedged recognizer: `listen` never resolves, not even on stop.
    pub deaf: AtomicBool,
}

impl FakeListener {
    pub fn answer(&self, text: &str) {
        self.script.lock().unwrap().push_back(text.to_string());
    }

    pub fn requests(&self) -> Vec<Duration> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechInput for FakeListener {
    async fn listen(&self, request: ListenRequest) -> Result<Option<String>, ServiceError> {
        self.requests.lock().unwrap().push(request.timeout);
        if self.deaf.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let (wait, answer) = match next {
            Some(text) => (ANSWER_DELAY, Some(text)),
            None => (request.timeout, None),
        };
        tokio::select! {
            _ = self.interrupt.notified() => Ok(None),
            _ = tokio::time::sleep(wait) => Ok(answer),
        }
    }

    fn stop_listening(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.interrupt.notify_waiters();
    }
}

// === Camera ===

pub struct FakeCamera {
    pub brightness: AtomicU8,
    pub hang: AtomicBool,
    pub fail_next: AtomicU32,
    pub captures: AtomicU32,
    in_flight: Arc<AtomicU32>,
    pub peak_in_flight: AtomicU32,
    last_options: Mutex<Option<CaptureOptions>>,
}

impl Default for FakeCamera {
    fn default() -> Self {
        Self {
            brightness: AtomicU8::new(128),
            hang: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            captures: AtomicU32::new(0),
            in_flight: Arc::new(AtomicU32::new(0)),
            peak_in_flight: AtomicU32::new(0),
            last_options: Mutex::new(None),
        }
    }
}

impl FakeCamera {
    pub fn last_options(&self) -> Option<CaptureOptions> {
        *self.last_options.lock().unwrap()
    }
}

struct InFlight(Arc<AtomicU32>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn capture(&self, options: CaptureOptions) -> Result<Frame, ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);
        self.captures.fetch_add(1, Ordering::SeqCst);

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ServiceError::Unavailable("camera not ready".into()));
        }
        let level = self.brightness.load(Ordering::SeqCst);
        Ok(Frame::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            16,
            12,
            Rgb([level, level, level]),
        ))))
    }
}

// === Vision / intent ===

pub struct FakeVision {
    hazards: Mutex<VecDeque<Hazard>>,
    pub classify_fails: AtomicBool,
    /// Returned instead of the keyword classification when set.
    pub forced_intent: Mutex<Option<ClassifiedIntent>>,
    pub analysis_delay: Mutex<Duration>,
    pub narration: Mutex<String>,
    last_location: Mutex<Option<Coordinates>>,
    pub safety_calls: AtomicU32,
    pub safety_fails: AtomicBool,
    pub safety_delay: Mutex<Duration>,
}

impl Default for FakeVision {
    fn default() -> Self {
        Self {
            hazards: Mutex::new(VecDeque::new()),
            classify_fails: AtomicBool::new(false),
            forced_intent: Mutex::new(None),
            analysis_delay: Mutex::new(Duration::from_millis(300)),
            narration: Mutex::new("A red door with a brass handle.".to_string()),
            last_location: Mutex::new(None),
            safety_calls: AtomicU32::new(0),
            safety_fails: AtomicBool::new(false),
            safety_delay: Mutex::new(Duration::from_millis(50)),
        }
    }
}

impl FakeVision {
    pub fn push_hazard(&self, hazard: Hazard) {
        self.hazards.lock().unwrap().push_back(hazard);
    }

    pub fn last_location(&self) -> Option<Coordinates> {
        *self.last_location.lock().unwrap()
    }
}

#[async_trait]
impl Vision for FakeVision {
    async fn classify_intent(&self, transcript: &str) -> Result<ClassifiedIntent, ServiceError> {
        if self.classify_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::Rejected("classifier offline".into()));
        }
        if let Some(intent) = self.forced_intent.lock().unwrap().clone() {
            return Ok(intent);
        }
        Ok(fallback::classify(transcript))
    }

    async fn analyze_image(
        &self,
        _frame: &Frame,
        _intent: IntentKind,
        location: Option<Coordinates>,
    ) -> Result<String, ServiceError> {
        *self.last_location.lock().unwrap() = location;
        let delay = *self.analysis_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        Ok(self.narration.lock().unwrap().clone())
    }

    async fn analyze_walking_safety(&self, _frame: &Frame) -> Result<Option<Hazard>, ServiceError> {
        self.safety_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.safety_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.safety_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::Transient("vision model overloaded".into()));
        }
        Ok(self.hazards.lock().unwrap().pop_front())
    }
}

// === Directions ===

pub struct FakeDirections {
    pub plan: Mutex<Option<NavigationPlan>>,
    pub transient_failures: AtomicU32,
    pub calls: AtomicU32,
}

impl Default for FakeDirections {
    fn default() -> Self {
        Self {
            plan: Mutex::new(Some(library_route())),
            transient_failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }
}

pub fn library_route() -> NavigationPlan {
    NavigationPlan::new(
        "the library",
        vec![
            "Head north on Elm Street for 100 meters.".to_string(),
            "Turn left onto Oak Avenue.".to_string(),
        ],
        180.0,
        150.0,
    )
}

#[async_trait]
impl Directions for FakeDirections {
    async fn walking_directions(
        &self,
        _destination: &str,
        _origin: Option<Coordinates>,
    ) -> Result<Option<NavigationPlan>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ServiceError::Transient("route server overloaded".into()));
        }
        Ok(self.plan.lock().unwrap().clone())
    }
}

// === Haptics, sounds, position ===

#[derive(Default)]
pub struct FakeFeedback {
    cues: Mutex<Vec<Cue>>,
    vibrations: Mutex<Vec<Vibration>>,
}

impl FakeFeedback {
    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().unwrap().clone()
    }

    pub fn vibrations(&self) -> Vec<Vibration> {
        self.vibrations.lock().unwrap().clone()
    }
}

impl Feedback for FakeFeedback {
    fn play_sound(&self, cue: Cue) {
        self.cues.lock().unwrap().push(cue);
    }

    fn vibrate(&self, pattern: Vibration) {
        self.vibrations.lock().unwrap().push(pattern);
    }
}

pub struct FakeLocation;

#[async_trait]
impl Location for FakeLocation {
    async fn current_location(&self, _timeout: Duration) -> Result<Coordinates, ServiceError> {
        Ok(Coordinates {
            latitude: 40.7128,
            longitude: -74.006,
            accuracy_m: Some(8.0),
        })
    }
}

// === Harness ===

pub fn test_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.rng_seed = Some(7);
    config.perception.path_clear_probability = 0.0;
    config
}

pub struct Harness {
    pub handle: OrchestratorHandle,
    pub speech: Arc<FakeSpeech>,
    pub listener: Arc<FakeListener>,
    pub camera: Arc<FakeCamera>,
    pub vision: Arc<FakeVision>,
    pub directions: Arc<FakeDirections>,
    pub feedback: Arc<FakeFeedback>,
    pub ambient: mpsc::Sender<AmbientSignal>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        let speech = Arc::new(FakeSpeech::default());
        let listener = Arc::new(FakeListener::default());
        let camera = Arc::new(FakeCamera::default());
        let vision = Arc::new(FakeVision::default());
        let directions = Arc::new(FakeDirections::default());
        let feedback = Arc::new(FakeFeedback::default());

        let services = Services {
            speech: speech.clone(),
            listener: listener.clone(),
            camera: camera.clone(),
            vision: vision.clone(),
            directions: directions.clone(),
            feedback: feedback.clone(),
            location: Arc::new(FakeLocation),
        };

        let orchestrator = Orchestrator::new(config, services);
        let handle = orchestrator.handle();
        let (ambient, ambient_rx) = mpsc::channel(16);
        handle.attach_ambient(ambient_rx);
        let task = tokio::spawn(orchestrator.run());

        Self {
            handle,
            speech,
            listener,
            camera,
            vision,
            directions,
            feedback,
            ambient,
            task,
        }
    }

    /// Presses the button and lets the event loop react.
    pub async fn press(&self) {
        self.handle.trigger().await;
        wait(Duration::from_millis(50)).await;
    }

    /// Presses, answers with `transcript`, and waits for the reply to finish.
    pub async fn command(&self, transcript: &str) {
        self.listener.answer(transcript);
        self.press().await;
        wait(Duration::from_secs(2)).await;
    }

    pub async fn overhear(&self, text: &str) {
        self.ambient
            .send(AmbientSignal::Speech(text.to_string()))
            .await
            .expect("distress monitor running");
        wait(Duration::from_millis(50)).await;
    }
}

pub async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
}
