use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::lock;
use crate::services::SpeechOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Completed,
    /// Cut off by a newer utterance or an explicit stop.
    Interrupted,
    Failed,
}

#[derive(Debug)]
struct Utterance {
    seq: u64,
    token: CancellationToken,
}

/// Serializes the two scarce resources: the user's ears and the camera.
///
/// Speech is cancel-and-replace: at most one utterance is audible, and a new
/// one always cuts off the current one. The camera is a held lock that is
/// never queued for; callers that cannot get it drop their request.
pub struct AttentionArbiter {
    speech: Arc<dyn SpeechOutput>,
    current: Arc<Mutex<Option<Utterance>>>,
    next_seq: AtomicU64,
    camera_busy: Arc<AtomicBool>,
}

impl AttentionArbiter {
    pub fn new(speech: Arc<dyn SpeechOutput>) -> Self {
        Self {
            speech,
            current: Arc::new(Mutex::new(None)),
            next_seq: AtomicU64::new(1),
            camera_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts an utterance and returns without waiting for it. The utterance
    /// owns the channel from the moment this returns.
    pub fn say(&self, text: impl Into<String>, priority: bool) -> JoinHandle<SpeechOutcome> {
        let text = text.into();
        let token = CancellationToken::new();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        {
            let mut current = lock(&self.current);
            if let Some(previous) = current.take() {
                debug!(priority, preempted = previous.seq, "cutting off current utterance");
                previous.token.cancel();
                self.speech.stop();
            }
            *current = Some(Utterance {
                seq,
                token: token.clone(),
            });
        }

        let speech = Arc::clone(&self.speech);
        let current = Arc::clone(&self.current);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => SpeechOutcome::Interrupted,
                result = speech.speak(&text) => match result {
                    Ok(()) => SpeechOutcome::Completed,
                    Err(e) => {
                        warn!("speech output failed: {}", e);
                        SpeechOutcome::Failed
                    }
                },
            };
            let mut slot = lock(&current);
            if slot.as_ref().map(|u| u.seq) == Some(seq) {
                *slot = None;
            }
            outcome
        })
    }

    /// Speaks and waits until the utterance ends or is cut off.
    pub async fn speak(&self, text: impl Into<String>, priority: bool) -> SpeechOutcome {
        match self.say(text, priority).await {
            Ok(outcome) => outcome,
            Err(_) => SpeechOutcome::Interrupted,
        }
    }

    /// Cancels the current utterance synchronously.
    pub fn stop_speaking(&self) {
        if let Some(utterance) = lock(&self.current).take() {
            utterance.token.cancel();
            self.speech.stop();
        }
    }

    pub fn is_speaking(&self) -> bool {
        lock(&self.current).is_some()
    }

    /// Takes the camera if nobody holds it. Never waits.
    pub fn try_camera(&self) -> Option<CameraLease> {
        self.camera_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CameraLease {
                busy: Arc::clone(&self.camera_busy),
            })
    }

    pub fn camera_in_flight(&self) -> bool {
        self.camera_busy.load(Ordering::SeqCst)
    }
}

/// Exclusive use of the camera and the analysis that follows a capture.
/// Released on drop.
#[derive(Debug)]
pub struct CameraLease {
    busy: Arc<AtomicBool>,
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}
