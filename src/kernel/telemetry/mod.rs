//! Orchestrator telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (perception, navigation,
//! emergency escalation). It exists solely for observability and verification.
//!
//! # PRIVACY INVARIANT
//! Telemetry must **NEVER** contain user content (transcripts, frames,
//! narration, locations). Only counts are recorded.

pub mod metrics;
pub mod recorder;

pub use metrics::TelemetrySnapshot;
pub use recorder::{Counter, Telemetry};
