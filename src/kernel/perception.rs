use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::{DistressEvent, Event};
use super::reactor::Core;
use super::scheduler::pause;
use super::state::StateDelta;
use super::telemetry::Counter;
use crate::config::PerceptionConfig;
use crate::services::CaptureOptions;
use crate::vision::{Frame, Hazard};

/// Outcome of one perception cycle, in strict priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Fall detected: hand over to emergency escalation, say nothing here.
    Emergency,
    Warn(String),
    Filler(String),
    PathClear(String),
    Silence,
}

/// Inputs to [`react`] that come from the session rather than the frame.
#[derive(Debug, Clone, Copy)]
pub struct ReactionContext {
    pub companion_mode: bool,
    pub speaking: bool,
    pub since_companion_message: Duration,
}

/// Pure function: (hazard, session context, rng) -> reaction.
/// fall > hazard message > companion filler > path-clear > silence.
pub fn react<R: Rng + ?Sized>(
    hazard: Option<&Hazard>,
    ctx: &ReactionContext,
    config: &PerceptionConfig,
    rng: &mut R,
) -> Reaction {
    if let Some(hazard) = hazard {
        if hazard.is_fall() {
            return Reaction::Emergency;
        }
        if hazard.is_actionable() {
            return Reaction::Warn(hazard.message.clone());
        }
    }

    if ctx.speaking {
        return Reaction::Silence;
    }

    if ctx.companion_mode {
        if ctx.since_companion_message >= config.companion_interval() {
            if let Some(phrase) = config.companion_phrases.choose(rng) {
                return Reaction::Filler(phrase.clone());
            }
        }
        return Reaction::Silence;
    }

    if rng.gen_bool(config.path_clear_probability.clamp(0.0, 1.0)) {
        return Reaction::PathClear(config.path_clear_message.clone());
    }
    Reaction::Silence
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Skipped,
    Dropped,
    Failed,
    Cancelled,
    Completed,
}

impl Core {
    /// The walking-mode loop. Lives as long as walking is active; each cycle
    /// is a no-op unless the session is `Walking` or `Navigating`.
    pub(crate) async fn run_perception(self: Arc<Self>, token: CancellationToken) {
        info!("perception loop started");
        let cadence = self.config.perception.cadence();
        loop {
            let cycle = self.perception_cycle(&token).await;
            if cycle != Cycle::Skipped {
                debug!(?cycle, "perception cycle");
            }
            if cycle == Cycle::Cancelled || !pause(&token, cadence).await {
                break;
            }
        }
        info!("perception loop stopped");
    }

    async fn perception_cycle(self: &Arc<Self>, token: &CancellationToken) -> Cycle {
        self.heartbeat.stamp();

        if !self.mode().is_moving() {
            self.telemetry.record(Counter::CycleSkipped);
            return Cycle::Skipped;
        }
        // Drop, never queue: if a capture/analyze is in flight this frame is lost.
        let Some(_lease) = self.arbiter.try_camera() else {
            self.telemetry.record(Counter::FrameDropped);
            return Cycle::Dropped;
        };

        let frame = match self.capture_walking_frame(token).await {
            Ok(frame) => frame,
            Err(cycle) => return cycle,
        };
        if frame.is_dark(self.config.perception.min_brightness) {
            self.telemetry.record(Counter::DarkFrame);
            return Cycle::Failed;
        }

        // One shot: a missed safety frame beats a stale one.
        let analysis = tokio::select! {
            biased;
            _ = token.cancelled() => return Cycle::Cancelled,
            _ = self.stopped_moving() => return self.abandon(),
            result = self.services.vision.analyze_walking_safety(&frame) => result,
        };
        let hazard = match analysis {
            Ok(hazard) => hazard,
            Err(e) => {
                debug!("hazard analysis failed: {}", e);
                self.telemetry.record(Counter::AnalysisFailed);
                return Cycle::Failed;
            }
        };

        if !self.mode().is_moving() {
            self.telemetry.record(Counter::StaleDiscard);
            return Cycle::Skipped;
        }

        let reaction = {
            let speaking = self.arbiter.is_speaking();
            let (companion_mode, since_companion_message) =
                self.read(|state| (state.companion_mode(), state.last_companion_message().elapsed()));
            let ctx = ReactionContext {
                companion_mode,
                speaking,
                since_companion_message,
            };
            let mut rng = super::lock(&self.rng);
            react(hazard.as_ref(), &ctx, &self.config.perception, &mut *rng)
        };
        self.act_on(reaction).await;
        self.telemetry.record(Counter::CycleCompleted);
        Cycle::Completed
    }

    /// The session left Walking / Navigating mid-cycle; the camera lease is
    /// released for whoever took over.
    fn abandon(&self) -> Cycle {
        debug!("mode changed mid-cycle, frame abandoned");
        self.telemetry.record(Counter::StaleDiscard);
        Cycle::Skipped
    }

    /// Captures a low-res silent frame, retrying exactly once.
    async fn capture_walking_frame(&self, token: &CancellationToken) -> Result<Frame, Cycle> {
        let options = CaptureOptions {
            low_res: true,
            silent: true,
        };
        for attempt in 0..2 {
            let captured = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Cycle::Cancelled),
                _ = self.stopped_moving() => return Err(self.abandon()),
                result = self.services.camera.capture(options) => result,
            };
            match captured {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    self.telemetry.record(Counter::CaptureFailed);
                    debug!(attempt, "capture failed: {}", e);
                    if attempt == 0 && !pause(token, self.config.perception.capture_retry_delay()).await {
                        return Err(Cycle::Cancelled);
                    }
                }
            }
        }
        Err(Cycle::Failed)
    }

    async fn act_on(self: &Arc<Self>, reaction: Reaction) {
        match reaction {
            Reaction::Emergency => {
                warn!("fall detected by perception loop");
                if self.events.send(Event::Distress(DistressEvent::fall())).await.is_err() {
                    warn!("event queue closed, fall not escalated");
                }
            }
            Reaction::Warn(message) => {
                self.arbiter.stop_speaking();
                self.arbiter.say(message, true);
                self.apply(StateDelta::CompanionSpoke(Instant::now()));
                self.telemetry.record(Counter::HazardAnnounced);
            }
            Reaction::Filler(phrase) => {
                self.arbiter.say(phrase, false);
                self.apply(StateDelta::CompanionSpoke(Instant::now()));
                self.telemetry.record(Counter::CompanionFiller);
            }
            Reaction::PathClear(message) => {
                self.arbiter.say(message, false);
                self.telemetry.record(Counter::PathClear);
            }
            Reaction::Silence => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::event::Severity;
    use crate::vision::HazardCategory;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx(companion_mode: bool, speaking: bool, since_secs: u64) -> ReactionContext {
        ReactionContext {
            companion_mode,
            speaking,
            since_companion_message: Duration::from_secs(since_secs),
        }
    }

    fn quiet_config() -> PerceptionConfig {
        PerceptionConfig {
            path_clear_probability: 0.0,
            ..PerceptionConfig::default()
        }
    }

    #[test]
    fn fall_beats_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut fall = Hazard::new(HazardCategory::Fall, Severity::High, "Watch out, car on the left");
        fall.direction = "left".into();
        let reaction = react(Some(&fall), &ctx(true, true, 60), &quiet_config(), &mut rng);
        assert_eq!(reaction, Reaction::Emergency);
    }

    #[test]
    fn hazard_speaks_even_over_current_speech() {
        let mut rng = StdRng::seed_from_u64(7);
        let hazard = Hazard::new(HazardCategory::Stairs, Severity::High, "Stairs ahead.");
        let reaction = react(Some(&hazard), &ctx(true, true, 60), &quiet_config(), &mut rng);
        assert_eq!(reaction, Reaction::Warn("Stairs ahead.".into()));
    }

    #[test]
    fn filler_waits_for_the_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = quiet_config();
        assert_eq!(react(None, &ctx(true, false, 14), &config, &mut rng), Reaction::Silence);
        match react(None, &ctx(true, false, 15), &config, &mut rng) {
            Reaction::Filler(phrase) => assert!(config.companion_phrases.contains(&phrase)),
            other => panic!("expected filler, got {:?}", other),
        }
    }

    #[test]
    fn filler_never_talks_over_speech() {
        let mut rng = StdRng::seed_from_u64(7);
        let clear = Hazard::clear();
        assert_eq!(react(Some(&clear), &ctx(true, true, 60), &quiet_config(), &mut rng), Reaction::Silence);
    }

    #[test]
    fn path_clear_only_without_companion() {
        let mut rng = StdRng::seed_from_u64(7);
        let always = PerceptionConfig {
            path_clear_probability: 1.0,
            ..PerceptionConfig::default()
        };
        assert_eq!(
            react(None, &ctx(false, false, 0), &always, &mut rng),
            Reaction::PathClear("Path is clear.".into())
        );
        assert_eq!(react(None, &ctx(true, false, 0), &always, &mut rng), Reaction::Silence);
        assert_eq!(react(None, &ctx(false, true, 0), &always, &mut rng), Reaction::Silence);
    }

    #[test]
    fn path_clear_is_rare() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = PerceptionConfig::default();
        let spoken = (0..10_000)
            .filter(|_| matches!(react(None, &ctx(false, false, 0), &config, &mut rng), Reaction::PathClear(_)))
            .count();
        assert!((300..=700).contains(&spoken), "expected roughly 5%, got {}", spoken);
    }
}
