//! Image-mode capability extraction.

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::Result;
use crate::llm::{ExtractionCapability, extraction_prompt};
use crate::models::event::FieldName;

use super::{StrategyOutput, call_capability};

const VISION_SOURCE: &str = "vision";

/// Sends the image straight to the capability.
pub struct VisionStrategy {
    timeout: Duration,
}

impl VisionStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Ask the capability for fields. Every source is `"vision"`.
    pub async fn extract(
        &self,
        image: &DynamicImage,
        capability: &dyn ExtractionCapability,
        timezone: &str,
    ) -> Result<StrategyOutput> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        debug!(bytes = png.len(), "Encoded image for vision call");

        let prompt = extraction_prompt(None, timezone);
        let mut output =
            call_capability(capability.image_to_json(&png, &prompt), self.timeout, "vision").await?;

        for name in FieldName::ALL {
            output.fields.get_mut(name).source = VISION_SOURCE.to_string();
        }
        for extra in &mut output.extra {
            extra.source = VISION_SOURCE.to_string();
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapabilityError, PosterError};
    use crate::llm::{MockModel, MockReply, sample_response};
    use crate::models::result::WarningType;

    fn image() -> DynamicImage {
        DynamicImage::new_luma8(40, 60)
    }

    #[tokio::test]
    async fn test_every_source_is_vision() {
        let mock = MockModel::scripted(MockReply::AuthFailure, MockReply::Json(sample_response()));
        let out = VisionStrategy::new(Duration::from_secs(5))
            .extract(&image(), &mock, "UTC")
            .await
            .unwrap();

        assert!(out.raw.is_none());
        assert!(out.fields.iter().all(|(_, f)| f.source == "vision"));
        assert!(out.extra.iter().all(|e| e.source == "vision"));
        assert_eq!(out.fields.venue_name.value.as_deref(), Some("Convention Center"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_invalid_json() {
        let mock = MockModel::scripted(MockReply::Raw("{}".into()), MockReply::Json(sample_response()))
            .with_latency(Duration::ZERO, Duration::from_secs(60));

        let out = VisionStrategy::new(Duration::from_secs(1))
            .extract(&image(), &mock, "UTC")
            .await
            .unwrap();

        assert!(out.failed);
        assert_eq!(out.fields.present_count(), 0);
        assert_eq!(out.warnings[0].kind, WarningType::InvalidJson);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let mock = MockModel::scripted(MockReply::Raw("{}".into()), MockReply::AuthFailure);
        let err = VisionStrategy::new(Duration::from_secs(5))
            .extract(&image(), &mock, "UTC")
            .await
            .unwrap_err();
        assert!(matches!(err, PosterError::Capability(CapabilityError::Auth(_))));
    }
}
