mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{test_config, wait, Harness};
use pathsense::kernel::event::Severity;
use pathsense::services::Cue;
use pathsense::vision::{Hazard, HazardCategory};
use pathsense::Mode;

#[tokio::test(start_paused = true)]
async fn test_walking_mode_runs_single_flight_loop() {
    let h = Harness::start();
    assert!(!h.handle.perception_running());

    h.command("start walking mode").await;
    assert_eq!(h.handle.mode(), Mode::Walking);
    assert!(h.handle.perception_running());

    wait(Duration::from_secs(3)).await;
    let snap = h.handle.telemetry();
    assert!(snap.perception.cycles_completed > 5, "{:?}", snap.perception);
    assert_eq!(h.camera.peak_in_flight.load(Ordering::SeqCst), 1);
    let options = h.camera.last_options().expect("camera used");
    assert!(options.low_res && options.silent);

    // Turning walking off ends the loop
    h.command("stop walking").await;
    assert_eq!(h.handle.mode(), Mode::Idle);
    assert!(!h.handle.perception_running());
}

#[tokio::test(start_paused = true)]
async fn test_hazard_is_announced() {
    let h = Harness::start();
    h.command("start walking mode").await;

    h.vision
        .push_hazard(Hazard::new(HazardCategory::Stairs, Severity::High, "Stairs going down, two meters ahead."));
    wait(Duration::from_secs(1)).await;

    assert!(h.speech.said("Stairs going down"));
    assert_eq!(h.handle.telemetry().speech.hazards_announced, 1);
    assert_eq!(h.handle.mode(), Mode::Walking);
}

#[tokio::test(start_paused = true)]
async fn test_fall_escalates_at_high_severity() {
    let h = Harness::start();
    h.command("start walking mode").await;

    // Fall wins over the message attached to the same frame
    h.vision
        .push_hazard(Hazard::new(HazardCategory::Fall, Severity::Medium, "Car approaching on the left."));
    wait(Duration::from_secs(1)).await;

    assert_eq!(h.handle.mode(), Mode::EmergencyCheck);
    let session = h.handle.session();
    let emergency = session.emergency().expect("emergency session");
    assert_eq!(emergency.severity, Severity::High);
    assert_eq!(emergency.prior, Mode::Walking);
    assert!(!h.speech.said("Car approaching"));
    assert!(h.speech.said("Are you okay?"));
}

#[tokio::test(start_paused = true)]
async fn test_companion_fillers_are_spaced() {
    let h = Harness::start();
    h.command("start walking mode").await;
    h.command("turn on companion mode").await;
    assert!(h.handle.session().companion_mode());

    wait(Duration::from_secs(62)).await;

    let phrases = test_config().perception.companion_phrases;
    let fillers: Vec<_> = h
        .speech
        .spoken_at()
        .into_iter()
        .filter(|(_, text)| phrases.contains(text))
        .collect();
    assert!(fillers.len() >= 3, "expected regular fillers, got {}", fillers.len());
    for pair in fillers.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        assert!(gap >= Duration::from_secs(15), "fillers {:?} apart", gap);
    }
    assert_eq!(h.handle.telemetry().speech.companion_fillers as usize, fillers.len());
}

#[tokio::test(start_paused = true)]
async fn test_filler_waits_after_hazard_warning() {
    let h = Harness::start();
    h.command("start walking mode").await;
    h.command("turn on companion mode").await;

    // Warning at ~10s into companion mode resets the filler timer
    wait(Duration::from_secs(10)).await;
    h.vision
        .push_hazard(Hazard::new(HazardCategory::Obstacle, Severity::Medium, "Bench on your right."));
    wait(Duration::from_secs(10)).await;

    assert!(h.speech.said("Bench on your right"));
    assert_eq!(h.handle.telemetry().speech.companion_fillers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dark_frames_are_skipped() {
    let h = Harness::start();
    h.camera.brightness.store(5, Ordering::SeqCst);
    h.command("start walking mode").await;
    wait(Duration::from_secs(2)).await;

    let snap = h.handle.telemetry();
    assert!(snap.perception.dark_frames > 0);
    assert_eq!(snap.perception.cycles_completed, 0);
    assert_eq!(h.vision.safety_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_is_retried_once_then_skipped() {
    let h = Harness::start();
    h.camera.fail_next.store(2, Ordering::SeqCst);
    h.command("start walking mode").await;
    wait(Duration::from_secs(1)).await;

    let snap = h.handle.telemetry();
    assert_eq!(snap.perception.capture_failures, 2);
    assert!(snap.perception.cycles_completed > 0);
    assert_eq!(h.handle.mode(), Mode::Walking);
}

#[tokio::test(start_paused = true)]
async fn test_loop_idles_during_a_command() {
    let h = Harness::start();
    h.command("start walking mode").await;

    h.press().await;
    assert_eq!(h.handle.mode(), Mode::Listening);
    let before = h.vision.safety_calls.load(Ordering::SeqCst);
    wait(Duration::from_secs(5)).await;
    let during = h.vision.safety_calls.load(Ordering::SeqCst);

    // At most the cycle already in flight when listening started
    assert!(during - before <= 1);
    assert!(h.handle.perception_running());
}

#[tokio::test(start_paused = true)]
async fn test_failed_hazard_analysis_is_not_retried() {
    let h = Harness::start();
    h.vision.safety_fails.store(true, Ordering::SeqCst);
    h.command("start walking mode").await;
    wait(Duration::from_secs(1)).await;

    // One analysis call per failed cycle, each cycle skipped; at most one
    // call may still be in flight
    let snap = h.handle.telemetry();
    let calls = h.vision.safety_calls.load(Ordering::SeqCst) as u64;
    let failures = snap.perception.analysis_failures;
    assert!(failures > 0);
    assert!(calls == failures || calls == failures + 1, "{} calls for {} failures", calls, failures);
    assert_eq!(snap.perception.cycles_completed, 0);
    assert_eq!(h.handle.mode(), Mode::Walking);
    assert!(h.handle.perception_running());

    // Analysis recovers: cycles complete again
    h.vision.safety_fails.store(false, Ordering::SeqCst);
    wait(Duration::from_secs(1)).await;
    assert!(h.handle.telemetry().perception.cycles_completed > 0);
}

#[tokio::test(start_paused = true)]
async fn test_command_frees_camera_held_by_slow_analysis() {
    let h = Harness::start();
    h.command("start walking mode").await;

    // A hazard analysis that outlives the whole command
    *h.vision.safety_delay.lock().unwrap() = Duration::from_secs(10);
    wait(Duration::from_secs(1)).await;

    h.command("what do you see").await;

    assert!(h.speech.said("red door"), "spoken: {:?}", h.speech.spoken());
    assert!(!h.feedback.cues().contains(&Cue::Error));
    assert_eq!(h.handle.mode(), Mode::Walking);
    assert!(h.handle.telemetry().stale_discards > 0);
    assert_eq!(h.camera.peak_in_flight.load(Ordering::SeqCst), 1);
}
