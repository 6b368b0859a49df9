//! JSON-over-HTTP adapter for the vision, intent and routing models.

pub mod client;

pub use client::ModelClient;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{Coordinates, ServiceError};
use crate::kernel::navigation::NavigationPlan;
use crate::vision::Hazard;

#[derive(Debug, Serialize)]
pub(crate) struct IntentRequest<'a> {
    pub transcript: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NarrationResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HazardResponse {
    #[serde(default)]
    pub hazard: Option<Hazard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DirectionsRequest<'a> {
    pub destination: &'a str,
    pub origin: Option<Coordinates>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectionsResponse {
    #[serde(default)]
    pub plan: Option<NavigationPlan>,
}

/// Maps a non-success status onto the retry taxonomy: overload and server
/// faults are transient, every other client error is final.
pub fn status_error(status: StatusCode) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ServiceError::Transient(format!("model server returned {}", status))
    } else if status == StatusCode::REQUEST_TIMEOUT {
        ServiceError::Timeout
    } else {
        ServiceError::Rejected(format!("model server returned {}", status))
    }
}

pub fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else if e.is_decode() || e.is_builder() {
        ServiceError::Rejected(e.to_string())
    } else if let Some(status) = e.status() {
        status_error(status)
    } else {
        ServiceError::Transient(e.to_string())
    }
}

/// Query string for an analysis request. Coordinates are fixed-point, so no
/// escaping is needed.
pub(crate) fn location_query(location: Option<Coordinates>) -> String {
    match location {
        Some(c) => format!("?lat={:.6}&lon={:.6}", c.latitude, c.longitude),
        None => String::new(),
    }
}
