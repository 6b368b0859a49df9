use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    location_query, status_error, transport_error, DirectionsRequest, DirectionsResponse, HazardResponse,
    IntentRequest, NarrationResponse,
};
use crate::intent::{ClassifiedIntent, IntentKind};
use crate::kernel::navigation::NavigationPlan;
use crate::services::{Coordinates, Directions, ServiceError, Vision};
use crate::vision::{Frame, Hazard};

const JPEG_QUALITY: u8 = 80;

#[derive(Clone)]
pub struct ModelClient {
    client: Client,
    base_url: String,
}

impl ModelClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        response.json::<T>().await.map_err(transport_error)
    }

    async fn post_frame<T: DeserializeOwned>(&self, path: &str, frame: &Frame) -> Result<T, ServiceError> {
        let body = frame.to_jpeg(JPEG_QUALITY)?;
        let (width, height) = frame.dimensions();
        debug!(path, width, height, bytes = body.len(), "posting frame");
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read(response).await
    }
}

#[async_trait]
impl Vision for ModelClient {
    async fn classify_intent(&self, transcript: &str) -> Result<ClassifiedIntent, ServiceError> {
        let response = self
            .client
            .post(format!("{}/intent", self.base_url))
            .json(&IntentRequest { transcript })
            .send()
            .await
            .map_err(transport_error)?;
        Self::read(response).await
    }

    async fn analyze_image(
        &self,
        frame: &Frame,
        intent: IntentKind,
        location: Option<Coordinates>,
    ) -> Result<String, ServiceError> {
        let path = format!("/analyze/{}{}", intent.as_str(), location_query(location));
        let narration: NarrationResponse = self.post_frame(&path, frame).await?;
        Ok(narration.text.trim().to_string())
    }

    async fn analyze_walking_safety(&self, frame: &Frame) -> Result<Option<Hazard>, ServiceError> {
        let parsed: HazardResponse = self.post_frame("/hazard", frame).await?;
        Ok(parsed.hazard)
    }
}

#[async_trait]
impl Directions for ModelClient {
    async fn walking_directions(
        &self,
        destination: &str,
        origin: Option<Coordinates>,
    ) -> Result<Option<NavigationPlan>, ServiceError> {
        let response = self
            .client
            .post(format!("{}/directions", self.base_url))
            .json(&DirectionsRequest { destination, origin })
            .send()
            .await
            .map_err(transport_error)?;
        let parsed: DirectionsResponse = Self::read(response).await?;
        Ok(parsed.plan)
    }
}
