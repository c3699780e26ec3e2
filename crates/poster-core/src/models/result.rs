//! Routes, warnings and the final extraction result.

use serde::{Deserialize, Serialize};

use crate::ocr::LayoutBlock;

use super::event::{EventFields, ExtraField, FieldName};

/// Route chosen before extraction starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialRoute {
    /// Recognition engine + text capability, validated.
    OcrFirst,
    /// Image capability only.
    Vision,
}

impl std::str::FromStr for InitialRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ocr_first" => Ok(InitialRoute::OcrFirst),
            "vision" => Ok(InitialRoute::Vision),
            other => Err(format!(
                "invalid force_route value: '{other}' (must be 'ocr_first' or 'vision')"
            )),
        }
    }
}

impl From<InitialRoute> for Route {
    fn from(route: InitialRoute) -> Self {
        match route {
            InitialRoute::OcrFirst => Route::OcrFirst,
            InitialRoute::Vision => Route::Vision,
        }
    }
}

/// Path actually executed for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    OcrFirst,
    Vision,
    OcrFallbackVision,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::OcrFirst => "ocr_first",
            Route::Vision => "vision",
            Route::OcrFallbackVision => "ocr_fallback_vision",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image complexity metrics used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Variance of the Laplacian response; low means blurry.
    pub blur_variance: f64,
    /// Fraction of edge pixels (0 - 1).
    pub edge_density: f64,
    /// Fraction of area covered by glyph-like components (0 - 1).
    pub text_density: f64,
    /// Combined score (0 - 1).
    pub overall_complexity: f64,
    /// `blur_variance` below the blur threshold.
    pub is_blurry: bool,
}

/// Warning category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningType {
    MissingCriticalField,
    LowConfidence,
    InvalidJson,
    FallbackTriggered,
    NormalizationFailed,
}

/// A non-fatal issue attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(rename = "type")]
    pub kind: WarningType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Warning {
    pub fn new(kind: WarningType) -> Self {
        Self {
            kind,
            message: None,
            fields: None,
            confidence: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_fields(mut self, fields: &[FieldName]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.as_str().to_string()).collect());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// OCR debug payload, attached when `extraction.include_raw` is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    /// Region-annotated text sent to the text capability.
    pub ocr_text: String,
    /// Recognized blocks in reading order.
    pub layout_blocks: Vec<LayoutBlock>,
}

/// Final result of one extraction request.
///
/// Built only by the pipeline; callers read it through accessors or
/// serialize it. Edits downstream happen on a copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    #[serde(rename = "type")]
    kind: &'static str,
    route: Route,
    complexity_score: Option<ComplexityScore>,
    confidence: f32,
    fields: EventFields,
    extra: Vec<ExtraField>,
    warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<RawData>,
}

impl ExtractionResult {
    pub(crate) fn new(
        route: Route,
        complexity_score: Option<ComplexityScore>,
        confidence: f32,
        fields: EventFields,
        extra: Vec<ExtraField>,
        warnings: Vec<Warning>,
        raw: Option<RawData>,
    ) -> Self {
        Self {
            kind: "event_poster",
            route,
            complexity_score,
            confidence,
            fields,
            extra,
            warnings,
            raw,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// `None` when the route was forced and analysis was skipped.
    pub fn complexity_score(&self) -> Option<&ComplexityScore> {
        self.complexity_score.as_ref()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn fields(&self) -> &EventFields {
        &self.fields
    }

    pub fn extra(&self) -> &[ExtraField] {
        &self.extra
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn raw(&self) -> Option<&RawData> {
        self.raw.as_ref()
    }

    /// Whether any warning of the given type is present.
    pub fn has_warning(&self, kind: WarningType) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
