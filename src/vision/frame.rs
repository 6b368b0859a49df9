use image::{DynamicImage, GenericImageView, ImageOutputFormat};

use crate::services::ServiceError;

/// A single camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Mean luma on a 0-255 scale.
    pub fn mean_brightness(&self) -> f32 {
        let luma = self.image.to_luma8();
        let count = luma.width() as u64 * luma.height() as u64;
        if count == 0 {
            return 0.0;
        }
        let sum: u64 = luma.pixels().map(|p| p.0[0] as u64).sum();
        sum as f32 / count as f32
    }

    /// Too dark to be worth sending for analysis.
    pub fn is_dark(&self, min_brightness: f32) -> bool {
        self.mean_brightness() < min_brightness
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, ServiceError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut bytes, ImageOutputFormat::Jpeg(quality))
            .map_err(|e| ServiceError::Rejected(format!("frame encoding failed: {}", e)))?;
        Ok(bytes)
    }
}
