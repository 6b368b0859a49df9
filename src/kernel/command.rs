//! The voice-command pipeline: listen, classify, dispatch.
//!
//! Every step runs under one [`Interaction`]. After each suspension point the
//! step either continues as the current interaction or returns silently;
//! state is only touched through `apply_if_current`.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cancel::Interaction;
use super::reactor::Core;
use super::state::{Mode, StateDelta};
use crate::intent::{fallback, ClassifiedIntent, IntentKind};
use crate::services::{retry_with_backoff, CaptureOptions, Cue, ListenRequest, ServiceError};
use crate::vision::Frame;

impl Core {
    pub(crate) async fn run_command(self: Arc<Self>, interaction: Interaction) {
        let request = ListenRequest {
            timeout: self.config.listen_timeout(),
            silence_timeout: self.config.silence_timeout(),
        };
        let Some(heard) = self.listen_for(&interaction, request).await else {
            return;
        };

        let transcript = heard.unwrap_or_default();
        let transcript = transcript.trim();
        if transcript.chars().count() < self.config.min_transcript_chars {
            debug!(interaction = interaction.id.0, "transcript too short");
            if self.reply(&interaction, "I didn't catch that. Press the button and try again.").await {
                self.restore(&interaction);
            }
            return;
        }
        debug!(interaction = interaction.id.0, transcript, "command heard");

        if !self.apply_if_current(&interaction, StateDelta::ModeChanged(Mode::ProcessingIntent)) {
            return;
        }
        let Some(intent) = self.classify(&interaction, transcript).await else {
            return;
        };
        info!(interaction = interaction.id.0, intent = intent.kind.as_str(), "dispatching command");
        self.dispatch_intent(&interaction, intent).await;
    }

    /// External classifier with retries, then the local keyword fallback.
    /// `None` only when the interaction was superseded.
    async fn classify(&self, interaction: &Interaction, transcript: &str) -> Option<ClassifiedIntent> {
        let vision = Arc::clone(&self.services.vision);
        let result = retry_with_backoff(&self.config.retry, &interaction.token, || {
            let vision = Arc::clone(&vision);
            let transcript = transcript.to_string();
            async move { vision.classify_intent(&transcript).await }
        })
        .await;

        if interaction.is_cancelled() {
            return None;
        }
        match result {
            Ok(intent) => Some(intent),
            Err(ServiceError::Aborted) => None,
            Err(e) => {
                warn!("intent classification failed, using keyword fallback: {}", e);
                Some(fallback::classify(transcript))
            }
        }
    }

    async fn dispatch_intent(self: &Arc<Self>, interaction: &Interaction, intent: ClassifiedIntent) {
        match intent.kind {
            IntentKind::CompanionOn | IntentKind::CompanionOff => {
                let enabled = intent.kind == IntentKind::CompanionOn;
                let delta = StateDelta::CompanionToggled {
                    enabled,
                    at: Instant::now(),
                };
                if !self.apply_if_current(interaction, delta) {
                    return;
                }
                let text = if enabled {
                    "Companion mode on. I'll check in with you while we walk."
                } else {
                    "Companion mode off."
                };
                self.finish(interaction, text).await;
            }
            IntentKind::WalkingOn | IntentKind::WalkingOff => {
                let enabled = intent.kind == IntentKind::WalkingOn;
                if !self.apply_if_current(interaction, StateDelta::WalkingToggled(enabled)) {
                    return;
                }
                let text = if enabled {
                    "Walking mode on. I'll warn you about obstacles."
                } else {
                    "Walking mode off."
                };
                self.finish(interaction, text).await;
            }
            IntentKind::Navigate => self.navigate(interaction, intent.destination).await,
            IntentKind::StopNavigation => self.stop_navigation(interaction).await,
            kind => self.answer_visually(interaction, kind).await,
        }
    }

    /// Speaks a final reply, then settles back into the resting mode.
    async fn finish(self: &Arc<Self>, interaction: &Interaction, text: &str) {
        if self.reply(interaction, text).await {
            self.restore(interaction);
        }
    }

    async fn navigate(self: &Arc<Self>, interaction: &Interaction, destination: Option<String>) {
        let Some(destination) = destination.filter(|d| !d.trim().is_empty()) else {
            self.finish(interaction, "Where would you like to go? Press the button and tell me the destination.")
                .await;
            return;
        };

        if !self.reply(interaction, &format!("Finding a walking route to {}.", destination)).await {
            return;
        }
        let Some(origin) = self.locate(interaction).await else {
            return;
        };

        let directions = Arc::clone(&self.services.directions);
        let result = retry_with_backoff(&self.config.retry, &interaction.token, || {
            let directions = Arc::clone(&directions);
            let destination = destination.clone();
            async move { directions.walking_directions(&destination, origin).await }
        })
        .await;
        if interaction.is_cancelled() {
            return;
        }

        let plan = match result {
            Ok(Some(plan)) if !plan.steps.is_empty() => plan,
            Ok(_) => {
                self.fail(interaction, &format!("I couldn't find a walking route to {}.", destination))
                    .await;
                return;
            }
            Err(ServiceError::Aborted) => return,
            Err(e) => {
                warn!("route request failed: {}", e);
                self.fail(interaction, "I couldn't reach the route service. Please try again.").await;
                return;
            }
        };

        let summary = plan.summary();
        info!(steps = plan.steps.len(), "route installed");
        if !self.apply_if_current(interaction, StateDelta::PlanInstalled(plan)) {
            return;
        }
        if !self.reply(interaction, &summary).await {
            return;
        }
        self.apply_if_current(interaction, StateDelta::ModeChanged(Mode::Navigating));
    }

    async fn stop_navigation(self: &Arc<Self>, interaction: &Interaction) {
        let was_navigating = self.read(|state| state.navigation().is_some());
        if !was_navigating {
            self.finish(interaction, "You're not navigating right now.").await;
            return;
        }
        if !self.apply_if_current(interaction, StateDelta::PlanCleared) {
            return;
        }
        self.finish(interaction, "Navigation stopped.").await;
    }

    /// Describe, read text, safety check, where am I, and anything unrecognized.
    async fn answer_visually(self: &Arc<Self>, interaction: &Interaction, kind: IntentKind) {
        let location = if kind == IntentKind::WhereAmI {
            let Some(location) = self.locate(interaction).await else {
                return;
            };
            location
        } else {
            None
        };

        if !self.apply_if_current(interaction, StateDelta::ModeChanged(Mode::Capturing)) {
            return;
        }
        let Some(frame) = self.capture_for_answer(interaction).await else {
            return;
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("camera unavailable for visual answer: {}", e);
                self.enter_error(interaction, "I can't use the camera right now.").await;
                return;
            }
        };
        if frame.is_dark(self.config.perception.min_brightness) {
            self.finish(interaction, "It's too dark for me to see anything. Try turning on a light.")
                .await;
            return;
        }

        if !self.apply_if_current(interaction, StateDelta::ModeChanged(Mode::Analyzing)) {
            return;
        }
        let analysis = interaction
            .guard(self.services.vision.analyze_image(&frame, kind, location))
            .await;
        let narration = match analysis {
            None => return,
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                warn!(intent = kind.as_str(), "image analysis failed: {}", e);
                self.fail(interaction, "Sorry, I couldn't make sense of that. Please try again.").await;
                return;
            }
        };

        if !self.apply_if_current(interaction, StateDelta::ModeChanged(Mode::Speaking)) {
            return;
        }
        self.finish(interaction, &narration).await;
    }

    /// Full-resolution capture with the shutter sound. `None` when superseded.
    async fn capture_for_answer(
        &self,
        interaction: &Interaction,
    ) -> Option<Result<Frame, ServiceError>> {
        let Some(_lease) = self.arbiter.try_camera() else {
            return Some(Err(ServiceError::Unavailable("camera busy".into())));
        };
        let options = CaptureOptions {
            low_res: false,
            silent: false,
        };
        interaction.guard(self.services.camera.capture(options)).await
    }

    /// A recoverable failure: apologize and go back to rest.
    async fn fail(self: &Arc<Self>, interaction: &Interaction, text: &str) {
        self.services.feedback.play_sound(Cue::Error);
        self.finish(interaction, text).await;
    }

    /// A failure fatal to this interaction: transient `Error` mode, then restore.
    async fn enter_error(self: &Arc<Self>, interaction: &Interaction, text: &str) {
        if !self.apply_if_current(interaction, StateDelta::ModeChanged(Mode::Error)) {
            return;
        }
        self.services.feedback.play_sound(Cue::Error);
        if !self.reply(interaction, text).await {
            return;
        }
        if interaction.guard(tokio::time::sleep(self.config.error_restore())).await.is_some() {
            self.restore(interaction);
        }
    }
}
