//! Recognition engine + text-mode capability.

use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GenericImageView};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{RecognitionError, Result};
use crate::llm::{ExtractionCapability, extraction_prompt};
use crate::models::event::FieldName;
use crate::models::result::RawData;
use crate::ocr::{LayoutBlock, RecognitionEngine, layout_blocks};

use super::{StrategyOutput, call_capability};

lazy_static! {
    // "line 3", "Lines 6-8", "L3", "line #2"
    static ref LINE_REF: Regex = Regex::new(r"(?i)^\s*(?:lines?\s*#?|l)\s*(\d+)\b").unwrap();
}

/// Extracts fields from recognized text.
pub struct TextStrategy {
    engine: Arc<dyn RecognitionEngine>,
    timeout: Duration,
}

impl TextStrategy {
    pub fn new(engine: Arc<dyn RecognitionEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Recognize, annotate, and ask the capability for fields.
    ///
    /// Recognition failures are returned as [`crate::PosterError::Recognition`];
    /// an image without text is not a failure.
    pub async fn extract(
        &self,
        image: &Arc<DynamicImage>,
        capability: &dyn ExtractionCapability,
        timezone: &str,
    ) -> Result<StrategyOutput> {
        let engine = Arc::clone(&self.engine);
        let input = Arc::clone(image);
        let boxes = tokio::task::spawn_blocking(move || engine.recognize(&input))
            .await
            .map_err(|e| RecognitionError::Failed(format!("recognition task aborted: {}", e)))??;

        let (_, height) = image.dimensions();
        let blocks = layout_blocks(boxes, height);
        let annotated = annotate_blocks(&blocks);

        info!(blocks = blocks.len(), "Text recognition complete");
        debug!("Annotated OCR text:\n{}", annotated);

        let prompt = extraction_prompt(Some(&annotated), timezone);
        let mut output =
            call_capability(capability.text_to_json(&prompt), self.timeout, "text").await?;

        for name in FieldName::ALL {
            let field = output.fields.get_mut(name);
            field.source = resolve_source(&field.source, &blocks);
        }
        for extra in &mut output.extra {
            extra.source = resolve_source(&extra.source, &blocks);
        }

        output.raw = Some(RawData {
            ocr_text: annotated,
            layout_blocks: blocks,
        });

        Ok(output)
    }
}

/// Render blocks as numbered lines prefixed with their region.
pub fn annotate_blocks(blocks: &[LayoutBlock]) -> String {
    blocks
        .iter()
        .enumerate()
        .map(|(i, b)| format!("[{}] L{}: {}", b.region, i + 1, b.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map a line reference to the region label of that line.
///
/// Sources that are not line references, or that point past the last line,
/// are returned unchanged.
pub fn resolve_source(source: &str, blocks: &[LayoutBlock]) -> String {
    LINE_REF
        .captures(source)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .and_then(|line| line.checked_sub(1))
        .and_then(|idx| blocks.get(idx))
        .map(|block| block.region.as_str().to_string())
        .unwrap_or_else(|| source.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockModel, MockReply};
    use crate::models::result::WarningType;
    use crate::ocr::{Region, TextBox};
    use serde_json::json;

    struct FixedEngine(Vec<TextBox>);

    impl RecognitionEngine for FixedEngine {
        fn recognize(&self, _image: &DynamicImage) -> std::result::Result<Vec<TextBox>, RecognitionError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenEngine;

    impl RecognitionEngine for BrokenEngine {
        fn recognize(&self, _image: &DynamicImage) -> std::result::Result<Vec<TextBox>, RecognitionError> {
            Err(RecognitionError::Failed("model crashed".into()))
        }
    }

    fn block(text: &str, region: Region) -> LayoutBlock {
        LayoutBlock {
            text: text.into(),
            bbox: [0.0; 8],
            confidence: 0.9,
            region,
        }
    }

    fn poster() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_luma8(300, 300))
    }

    #[test]
    fn test_annotate_blocks() {
        let blocks = vec![block("JAZZ NIGHT", Region::Top), block("Blue Note", Region::Bottom)];
        assert_eq!(annotate_blocks(&blocks), "[top] L1: JAZZ NIGHT\n[bottom] L2: Blue Note");
    }

    #[test]
    fn test_resolve_source() {
        let blocks = vec![
            block("a", Region::Top),
            block("b", Region::Middle),
            block("c", Region::Bottom),
        ];
        assert_eq!(resolve_source("line 2", &blocks), "middle");
        assert_eq!(resolve_source("Lines 3-4", &blocks), "bottom");
        assert_eq!(resolve_source("L1", &blocks), "top");
        assert_eq!(resolve_source("line 9", &blocks), "line 9");
        assert_eq!(resolve_source("line 0", &blocks), "line 0");
        assert_eq!(resolve_source("top banner", &blocks), "top banner");
    }

    #[tokio::test]
    async fn test_sources_resolve_to_regions() {
        let engine = FixedEngine(vec![
            TextBox::from_rect("JAZZ NIGHT", 10.0, 10.0, 200.0, 30.0, 0.95),
            TextBox::from_rect("Blue Note Club", 10.0, 250.0, 200.0, 20.0, 0.9),
        ]);
        let mock = MockModel::scripted(
            MockReply::Json(json!({
                "fields": {
                    "event_name": {"value": "Jazz Night", "confidence": 0.9, "source": "line 1"},
                    "venue_name": {"value": "Blue Note Club", "confidence": 0.8, "source": "line 2"}
                }
            })),
            MockReply::AuthFailure,
        );

        let strategy = TextStrategy::new(Arc::new(engine), Duration::from_secs(5));
        let out = strategy.extract(&poster(), &mock, "UTC").await.unwrap();

        assert!(!out.failed);
        assert_eq!(out.fields.event_name.source, "top");
        assert_eq!(out.fields.venue_name.source, "bottom");
        let raw = out.raw.unwrap();
        assert_eq!(raw.layout_blocks.len(), 2);
        assert!(raw.ocr_text.starts_with("[top] L1: JAZZ NIGHT"));
    }

    #[tokio::test]
    async fn test_malformed_output_degrades() {
        let mock = MockModel::scripted(MockReply::Raw("no json here".into()), MockReply::AuthFailure);
        let strategy = TextStrategy::new(Arc::new(FixedEngine(Vec::new())), Duration::from_secs(5));

        let out = strategy.extract(&poster(), &mock, "UTC").await.unwrap();
        assert!(out.failed);
        assert_eq!(out.fields.present_count(), 0);
        assert_eq!(out.warnings[0].kind, WarningType::InvalidJson);
    }

    #[tokio::test]
    async fn test_engine_failure_is_recognition_error() {
        let mock = MockModel::scripted(MockReply::Raw("{}".into()), MockReply::Raw("{}".into()));
        let strategy = TextStrategy::new(Arc::new(BrokenEngine), Duration::from_secs(5));

        let err = strategy.extract(&poster(), &mock, "UTC").await.unwrap_err();
        assert!(matches!(err, crate::PosterError::Recognition(_)));
    }
}
