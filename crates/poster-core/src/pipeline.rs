//! Request orchestration: analyze, route, extract, validate, fall back,
//! normalize.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use image::DynamicImage;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::analysis::{ComplexityAnalyzer, ComplexityPolicy, route};
use crate::error::{PosterError, Result};
use crate::extract::{StrategyOutput, TextStrategy, VisionStrategy};
use crate::llm::ExtractionCapability;
use crate::models::config::PosterConfig;
use crate::models::result::{
    ComplexityScore, ExtractionResult, InitialRoute, RawData, Route, Warning, WarningType,
};
use crate::ocr::{ImagePreprocessor, RecognitionEngine};
use crate::postprocess::{Normalizer, Validation, Validator, aggregate_confidence};

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOptions {
    /// Skip analysis and start on this route.
    pub force_route: Option<InitialRoute>,
    /// Timezone for date/time interpretation; config default when unset.
    pub timezone: Option<String>,
    /// Attach OCR text and blocks; config default when unset.
    pub include_raw: Option<bool>,
    /// Correlation id for logs.
    pub request_id: Option<String>,
}

/// Orchestrator states. Each request walks them in order.
#[derive(Debug)]
enum State {
    Start,
    Analyzing(Arc<DynamicImage>),
    Routed(Arc<DynamicImage>, InitialRoute),
    Extracting(Arc<DynamicImage>, Route),
    Validating(Arc<DynamicImage>, StrategyOutput),
    Accepted(StrategyOutput),
    FallingBack(Arc<DynamicImage>, StrategyOutput, Validation),
    Normalizing(StrategyOutput),
    Done(ExtractionResult),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Start => "start",
            State::Analyzing(..) => "analyzing",
            State::Routed(..) => "routed",
            State::Extracting(..) => "extracting",
            State::Validating(..) => "validating",
            State::Accepted(..) => "accepted",
            State::FallingBack(..) => "falling_back",
            State::Normalizing(..) => "normalizing",
            State::Done(..) => "done",
        }
    }
}

/// The extraction pipeline.
///
/// Holds only read-only state, so one instance serves concurrent requests.
pub struct Pipeline {
    config: Arc<PosterConfig>,
    preprocessor: ImagePreprocessor,
    analyzer: Arc<ComplexityAnalyzer>,
    validator: Validator,
    normalizer: Normalizer,
    text: Option<TextStrategy>,
    vision: VisionStrategy,
}

impl Pipeline {
    /// Build a pipeline. Without a recognition engine every request runs as
    /// vision.
    pub fn new(config: PosterConfig, engine: Option<Arc<dyn RecognitionEngine>>) -> Self {
        let timeout = config.capability.timeout();
        Self {
            preprocessor: ImagePreprocessor::new(&config.preprocessing, &config.limits),
            analyzer: Arc::new(ComplexityAnalyzer::new(&config.analysis, &config.routing)),
            validator: Validator::new(&config.validation),
            normalizer: Normalizer::new(),
            text: engine.map(|e| TextStrategy::new(e, timeout)),
            vision: VisionStrategy::new(timeout),
            config: Arc::new(config),
        }
    }

    /// Replace the complexity weighting.
    pub fn with_complexity_policy(mut self, policy: Box<dyn ComplexityPolicy>) -> Self {
        let analyzer = ComplexityAnalyzer::new(&self.config.analysis, &self.config.routing)
            .with_policy(policy);
        self.analyzer = Arc::new(analyzer);
        self
    }

    /// Resolve year-less dates against a fixed day instead of today.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.normalizer = Normalizer::new().with_reference_date(date);
        self
    }

    pub fn config(&self) -> &PosterConfig {
        &self.config
    }

    /// Whether a recognition engine is configured.
    pub fn has_recognition(&self) -> bool {
        self.text.is_some()
    }

    /// Run one extraction request.
    pub async fn process(
        &self,
        image: &[u8],
        options: &ExtractionOptions,
        capability: &dyn ExtractionCapability,
    ) -> Result<ExtractionResult> {
        let span = info_span!(
            "extract",
            request_id = options.request_id.as_deref().unwrap_or("-")
        );
        self.run(image, options, capability).instrument(span).await
    }

    async fn run(
        &self,
        bytes: &[u8],
        options: &ExtractionOptions,
        capability: &dyn ExtractionCapability,
    ) -> Result<ExtractionResult> {
        let start = Instant::now();
        let timezone = options
            .timezone
            .as_deref()
            .unwrap_or(&self.config.extraction.timezone)
            .to_string();
        let include_raw = options.include_raw.unwrap_or(self.config.extraction.include_raw);

        let mut complexity: Option<ComplexityScore> = None;
        let mut route_taken = Route::Vision;
        let mut warnings: Vec<Warning> = Vec::new();
        let mut raw: Option<RawData> = None;

        let mut state = State::Start;
        loop {
            let from = state.name();
            state = match state {
                State::Start => {
                    let image = self.preprocess(bytes).await?;
                    match options.force_route {
                        Some(forced) => {
                            info!(route = ?forced, "Route forced, skipping analysis");
                            State::Routed(image, forced)
                        }
                        None => State::Analyzing(image),
                    }
                }

                State::Analyzing(image) => {
                    let score = self.analyze(&image).await?;
                    let initial = route(&score, &self.config.routing);
                    info!(
                        overall = score.overall_complexity,
                        is_blurry = score.is_blurry,
                        route = ?initial,
                        "Complexity analysis routed request"
                    );
                    complexity = Some(score);
                    State::Routed(image, initial)
                }

                State::Routed(image, InitialRoute::OcrFirst) if self.text.is_none() => {
                    warn!("No recognition engine configured, continuing as vision");
                    State::Extracting(image, Route::Vision)
                }
                State::Routed(image, initial) => State::Extracting(image, initial.into()),

                State::Extracting(image, Route::OcrFirst) => {
                    match self.extract_text(&image, capability, &timezone).await {
                        Ok(output) => {
                            route_taken = Route::OcrFirst;
                            State::Validating(image, output)
                        }
                        Err(PosterError::Recognition(err)) => {
                            warn!(error = %err, "Recognition engine unavailable, continuing as vision");
                            State::Extracting(image, Route::Vision)
                        }
                        Err(err) => return Err(err),
                    }
                }
                State::Extracting(image, _) => {
                    route_taken = Route::Vision;
                    let output = self.vision.extract(&image, capability, &timezone).await?;
                    State::Normalizing(output)
                }

                State::Validating(image, output) => {
                    let validation = self.validator.validate(&output.fields);
                    if validation.accepted {
                        State::Accepted(output)
                    } else {
                        debug!(reasons = ?validation.reasons, "Text result rejected");
                        State::FallingBack(image, output, validation)
                    }
                }

                State::Accepted(output) => State::Normalizing(output),

                State::FallingBack(image, text_output, validation) => {
                    route_taken = Route::OcrFallbackVision;
                    warnings.push(
                        Warning::new(WarningType::FallbackTriggered).with_message(format!(
                            "Text extraction rejected ({} reasons), retried with vision",
                            validation.reasons.len()
                        )),
                    );

                    let vision_output = self.vision.extract(&image, capability, &timezone).await?;
                    let mut kept = if vision_output.failed {
                        warn!("Vision fallback failed, keeping text result");
                        let mut kept = text_output;
                        kept.warnings.extend(vision_output.warnings);
                        kept
                    } else {
                        let mut kept = vision_output;
                        kept.raw = text_output.raw;
                        kept
                    };
                    // The fallback leg never escalates again.
                    kept.failed = false;
                    State::Normalizing(kept)
                }

                State::Normalizing(output) => {
                    warnings.extend(output.warnings);
                    if include_raw {
                        raw = output.raw;
                    }

                    let normalized = self.normalizer.normalize(output.fields, &timezone);
                    warnings.extend(normalized.warnings);

                    // Outstanding validator reasons on the final fields.
                    warnings.extend(self.validator.validate(&normalized.fields).to_warnings());

                    let confidence = aggregate_confidence(&normalized.fields);
                    State::Done(ExtractionResult::new(
                        route_taken,
                        complexity,
                        confidence,
                        normalized.fields,
                        output.extra,
                        std::mem::take(&mut warnings),
                        raw.take(),
                    ))
                }

                State::Done(result) => {
                    info!(
                        route = %result.route(),
                        confidence = result.confidence(),
                        warnings = result.warnings().len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Extraction complete"
                    );
                    return Ok(result);
                }
            };
            debug!(from, to = state.name(), "State transition");
        }
    }

    async fn preprocess(&self, bytes: &[u8]) -> Result<Arc<DynamicImage>> {
        let preprocessor = self.preprocessor.clone();
        let bytes = bytes.to_vec();
        let image = tokio::task::spawn_blocking(move || preprocessor.preprocess(&bytes))
            .await
            .map_err(|e| PosterError::InvalidInput(format!("preprocessing aborted: {}", e)))??;
        Ok(Arc::new(image))
    }

    async fn analyze(&self, image: &Arc<DynamicImage>) -> Result<ComplexityScore> {
        let analyzer = Arc::clone(&self.analyzer);
        let image = Arc::clone(image);
        tokio::task::spawn_blocking(move || analyzer.analyze(&image))
            .await
            .map_err(|e| PosterError::InvalidInput(format!("analysis aborted: {}", e)))
    }

    async fn extract_text(
        &self,
        image: &Arc<DynamicImage>,
        capability: &dyn ExtractionCapability,
        timezone: &str,
    ) -> Result<StrategyOutput> {
        match &self.text {
            Some(strategy) => strategy.extract(image, capability, timezone).await,
            None => Err(crate::error::RecognitionError::Unavailable(
                "no recognition engine configured".into(),
            )
            .into()),
        }
    }
}
