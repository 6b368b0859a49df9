use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::arbiter::AttentionArbiter;
use super::cancel::{CancellationRegistry, Interaction};
use super::distress::AmbientSignal;
use super::event::Event;
use super::lock;
use super::scheduler::LoopHandle;
use super::state::{Mode, SessionState, StateDelta};
use super::telemetry::{Counter, Telemetry, TelemetrySnapshot};
use super::time::Heartbeat;
use crate::config::OrchestratorConfig;
use crate::services::{Coordinates, Cue, ListenRequest, Services, Vibration};

/// Capacity of the orchestrator event queue.
pub const EVENT_QUEUE: usize = 64;

#[derive(Debug, Default)]
struct Loops {
    perception: Option<LoopHandle>,
    narrator: Option<LoopHandle>,
    watchdog: Option<LoopHandle>,
    distress: Option<LoopHandle>,
}

/// Shared orchestrator core. Owns the single session state; every component
/// (perception, narrator, emergency, command pipeline) is an `impl Core` block
/// in its own module and requests transitions through `update`.
pub(crate) struct Core {
    pub(crate) config: OrchestratorConfig,
    pub(crate) services: Services,
    pub(crate) arbiter: AttentionArbiter,
    pub(crate) registry: CancellationRegistry,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) telemetry: Telemetry,
    pub(crate) events: mpsc::Sender<Event>,
    pub(crate) rng: Mutex<StdRng>,
    shutdown: CancellationToken,
    modes: watch::Sender<Mode>,
    state: Mutex<SessionState>,
    loops: Mutex<Loops>,
    last_trigger: Mutex<Option<Instant>>,
}

enum TriggerAction {
    CancelEmergency,
    StopListening,
    Listen(Interaction),
}

impl Core {
    fn new(config: OrchestratorConfig, services: Services, events: mpsc::Sender<Event>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = SessionState::new();
        let (modes, _) = watch::channel(state.mode());
        Self {
            arbiter: AttentionArbiter::new(Arc::clone(&services.speech)),
            config,
            services,
            registry: CancellationRegistry::new(),
            heartbeat: Heartbeat::new(),
            telemetry: Telemetry::new(),
            events,
            rng: Mutex::new(rng),
            shutdown: CancellationToken::new(),
            modes,
            state: Mutex::new(state),
            loops: Mutex::new(Loops::default()),
            last_trigger: Mutex::new(None),
        }
    }

    // === State access ===

    pub(crate) fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub(crate) fn mode(&self) -> Mode {
        self.read(|state| state.mode())
    }

    /// Runs `f` under the state lock, then brings the background loops in
    /// line with the resulting state.
    pub(crate) fn update<R>(self: &Arc<Self>, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, from, to, perception, narrator) = {
            let mut state = lock(&self.state);
            let from = state.mode();
            let result = f(&mut state);
            let to = state.mode();
            if from != to {
                // Published under the lock so watchers see transitions in order.
                self.modes.send_replace(to);
            }
            let narrator = to == Mode::Navigating && state.navigation().is_some();
            (result, from, to, state.walking_active(), narrator)
        };
        if from != to {
            info!(?from, ?to, "mode transition");
        }
        self.reconcile(perception, narrator);
        result
    }

    /// Resolves once the session is outside Walking / Navigating.
    pub(crate) async fn stopped_moving(&self) {
        let mut modes = self.modes.subscribe();
        let _ = modes.wait_for(|mode| !mode.is_moving()).await;
    }

    pub(crate) fn apply(self: &Arc<Self>, delta: StateDelta) {
        self.update(|state| state.reduce(delta));
    }

    /// Applies `delta` only if `interaction` is still current. The check and
    /// the mutation happen under the same lock.
    pub(crate) fn apply_if_current(self: &Arc<Self>, interaction: &Interaction, delta: StateDelta) -> bool {
        let applied = self.update(|state| {
            if !self.registry.is_current(interaction.id) {
                return false;
            }
            state.reduce(delta);
            true
        });
        if !applied {
            debug!(interaction = interaction.id.0, "stale interaction, change discarded");
            self.telemetry.record(Counter::StaleDiscard);
        }
        applied
    }

    /// Returns to Walking / Navigating / Idle once an interaction is done.
    pub(crate) fn restore(self: &Arc<Self>, interaction: &Interaction) {
        self.update(|state| {
            if self.registry.is_current(interaction.id) {
                state.reduce(StateDelta::ModeChanged(state.resting_mode()));
            }
        });
    }

    /// Speaks on behalf of `interaction`. False once it has been superseded.
    pub(crate) async fn reply(&self, interaction: &Interaction, text: &str) -> bool {
        if interaction.is_cancelled() {
            return false;
        }
        interaction.guard(self.arbiter.speak(text, false)).await.is_some()
    }

    /// Listens for one utterance. Outer `None` when superseded; inner `None`
    /// on silence, timeout or a recognizer failure. The window is enforced
    /// here even if the recognizer overruns it.
    pub(crate) async fn listen_for(&self, interaction: &Interaction, request: ListenRequest) -> Option<Option<String>> {
        let window = tokio::time::timeout(request.timeout, self.services.listener.listen(request));
        match interaction.guard(window).await? {
            Ok(Ok(text)) => Some(text.filter(|t| !t.trim().is_empty())),
            Ok(Err(e)) => {
                debug!("listen failed: {}", e);
                Some(None)
            }
            Err(_) => {
                debug!(window_ms = request.timeout.as_millis() as u64, "listen window elapsed");
                self.services.listener.stop_listening();
                Some(None)
            }
        }
    }

    /// Best-effort position fix. Outer `None` when superseded; inner `None`
    /// when no fix arrived in time.
    pub(crate) async fn locate(&self, interaction: &Interaction) -> Option<Option<Coordinates>> {
        let timeout = self.config.geolocation_timeout();
        let lookup = tokio::time::timeout(timeout, self.services.location.current_location(timeout));
        match interaction.guard(lookup).await? {
            Ok(Ok(coords)) => Some(Some(coords)),
            Ok(Err(e)) => {
                debug!("location unavailable: {}", e);
                Some(None)
            }
            Err(_) => {
                debug!("location timed out");
                Some(None)
            }
        }
    }

    // === Loops ===

    fn reconcile(self: &Arc<Self>, perception: bool, narrator: bool) {
        let live = !self.shutdown.is_cancelled();
        let mut loops = lock(&self.loops);

        if perception && live {
            if !loops.perception.as_ref().is_some_and(LoopHandle::is_running) {
                loops.perception = Some(self.spawn_perception());
            }
        } else if let Some(handle) = loops.perception.take() {
            handle.stop();
        }

        if narrator && live {
            if !loops.narrator.as_ref().is_some_and(LoopHandle::is_running) {
                let core = Arc::clone(self);
                loops.narrator = Some(LoopHandle::spawn("narrator", &self.shutdown, move |token| {
                    core.run_narrator(token)
                }));
            }
        } else if let Some(handle) = loops.narrator.take() {
            handle.stop();
        }
    }

    fn spawn_perception(self: &Arc<Self>) -> LoopHandle {
        let core = Arc::clone(self);
        LoopHandle::spawn("perception", &self.shutdown, move |token| core.run_perception(token))
    }

    /// Force-restarts the perception loop: stop the old handle, spawn a new one.
    pub(crate) fn restart_perception(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let mut loops = lock(&self.loops);
        if let Some(old) = loops.perception.take() {
            old.stop();
        }
        loops.perception = Some(self.spawn_perception());
        self.heartbeat.stamp();
    }

    pub(crate) fn perception_running(&self) -> bool {
        lock(&self.loops).perception.as_ref().is_some_and(LoopHandle::is_running)
    }

    // === Events ===

    fn dispatch(self: &Arc<Self>, event: Event) {
        match event {
            Event::Trigger => self.handle_trigger(),
            Event::Distress(distress) => self.on_distress(distress),
            Event::Shutdown => self.shut_down(),
        }
    }

    fn handle_trigger(self: &Arc<Self>) {
        let now = Instant::now();
        {
            let mut last = lock(&self.last_trigger);
            if last.is_some_and(|prev| now.duration_since(prev) < self.config.trigger_debounce()) {
                debug!("trigger debounced");
                return;
            }
            *last = Some(now);
        }

        let action = self.update(|state| {
            let mode = state.mode();
            if mode.is_emergency() {
                return TriggerAction::CancelEmergency;
            }
            let interaction = self.registry.begin();
            if mode == Mode::Listening {
                state.reduce(StateDelta::ModeChanged(state.resting_mode()));
                TriggerAction::StopListening
            } else {
                state.reduce(StateDelta::ModeChanged(Mode::Listening));
                TriggerAction::Listen(interaction)
            }
        });

        match action {
            TriggerAction::CancelEmergency => self.cancel_emergency(),
            TriggerAction::StopListening => {
                info!("listening stopped by trigger");
                self.services.listener.stop_listening();
            }
            TriggerAction::Listen(interaction) => {
                info!(interaction = interaction.id.0, "listening for command");
                self.arbiter.stop_speaking();
                self.services.feedback.play_sound(Cue::Listening);
                self.services.feedback.vibrate(Vibration::Tap);
                tokio::spawn(Arc::clone(self).run_command(interaction));
            }
        }
    }

    fn attach_ambient(self: &Arc<Self>, signals: mpsc::Receiver<AmbientSignal>) {
        let core = Arc::clone(self);
        let handle = LoopHandle::spawn("distress", &self.shutdown, move |token| {
            core.run_distress_monitor(signals, token)
        });
        if let Some(old) = lock(&self.loops).distress.replace(handle) {
            old.stop();
        }
    }

    fn shut_down(&self) {
        if !self.shutdown.is_cancelled() {
            info!("orchestrator shutting down");
        }
        self.shutdown.cancel();
        self.registry.cancel_current();
        self.arbiter.stop_speaking();
        self.services.listener.stop_listening();
        let mut loops = lock(&self.loops);
        for handle in [
            loops.perception.take(),
            loops.narrator.take(),
            loops.watchdog.take(),
            loops.distress.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.stop();
        }
    }
}

/// The orchestrator event loop. Construct, take a [`OrchestratorHandle`],
/// then drive it with [`Orchestrator::run`].
pub struct Orchestrator {
    core: Arc<Core>,
    receiver: mpsc::Receiver<Event>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, services: Services) -> Self {
        let (tx, receiver) = mpsc::channel(EVENT_QUEUE);
        Self {
            core: Arc::new(Core::new(config, services, tx)),
            receiver,
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            core: Arc::clone(&self.core),
        }
    }

    /// Drains the event queue until shutdown. Starts the watchdog.
    pub async fn run(mut self) {
        info!("orchestrator started");
        {
            let core = Arc::clone(&self.core);
            let watchdog = LoopHandle::spawn("watchdog", &self.core.shutdown, move |token| core.run_watchdog(token));
            lock(&self.core.loops).watchdog = Some(watchdog);
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = self.core.shutdown.cancelled() => break,
                event = self.receiver.recv() => event,
            };
            match event {
                Some(event) => {
                    debug!(?event, "event");
                    self.core.dispatch(event);
                }
                None => {
                    warn!("event queue closed");
                    break;
                }
            }
        }

        self.core.shut_down();
        info!("orchestrator stopped");
    }
}

/// Cloneable control surface for a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    core: Arc<Core>,
}

impl OrchestratorHandle {
    /// Presses the command button.
    pub async fn trigger(&self) {
        if self.core.events.send(Event::Trigger).await.is_err() {
            warn!("orchestrator stopped, trigger dropped");
        }
    }

    /// Starts the distress monitor over an ambient signal stream.
    pub fn attach_ambient(&self, signals: mpsc::Receiver<AmbientSignal>) {
        self.core.attach_ambient(signals);
    }

    pub fn mode(&self) -> Mode {
        self.core.mode()
    }

    /// Copy of the session state.
    pub fn session(&self) -> SessionState {
        self.core.read(SessionState::clone)
    }

    pub fn is_speaking(&self) -> bool {
        self.core.arbiter.is_speaking()
    }

    pub fn perception_running(&self) -> bool {
        self.core.perception_running()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.core.telemetry.snapshot()
    }

    /// Stops every loop, speech and listening, and ends `run`.
    pub fn shutdown(&self) {
        self.core.shut_down();
    }
}
