//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the poster pipeline.
///
/// The value is immutable once a [`crate::pipeline::Pipeline`] is built and is
/// shared read-only across concurrent requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterConfig {
    /// Route selection thresholds.
    pub routing: RoutingConfig,

    /// Complexity analysis parameters.
    pub analysis: AnalysisConfig,

    /// Acceptance rules for text-strategy results.
    pub validation: ValidationConfig,

    /// Language-understanding capability settings.
    pub capability: CapabilityConfig,

    /// Input limits.
    pub limits: LimitsConfig,

    /// Image preprocessing settings.
    pub preprocessing: PreprocessingConfig,

    /// Extraction output settings.
    pub extraction: ExtractionConfig,

    /// Recognition model files.
    pub models: ModelConfig,

    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Router thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Laplacian variance below which an image counts as blurry.
    pub blur_threshold: f64,

    /// Overall complexity above which the vision route is chosen.
    pub complexity_threshold: f64,

    /// Text density above which a sharp image goes OCR-first.
    pub text_density_threshold: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            complexity_threshold: 0.7,
            text_density_threshold: 0.5,
        }
    }
}

/// Complexity analyzer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Weight of the blur signal in the overall score.
    pub blur_weight: f64,

    /// Weight of edge density in the overall score.
    pub edge_weight: f64,

    /// Weight of the sparse-text signal (1 - text density).
    pub text_weight: f64,

    /// Canny low hysteresis threshold.
    pub canny_low: f32,

    /// Canny high hysteresis threshold.
    pub canny_high: f32,

    /// Half-size of the adaptive threshold window, in pixels.
    pub threshold_block_radius: u32,

    /// Offset subtracted from the local mean when binarizing.
    pub threshold_offset: i32,

    /// Smallest connected component (pixels) counted as a glyph.
    pub min_glyph_area: u32,

    /// Largest glyph bounding box, as a fraction of image height.
    pub max_glyph_height_ratio: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            blur_weight: 0.3,
            edge_weight: 0.4,
            text_weight: 0.3,
            canny_low: 50.0,
            canny_high: 150.0,
            threshold_block_radius: 7,
            threshold_offset: 5,
            min_glyph_area: 6,
            max_glyph_height_ratio: 0.15,
        }
    }
}

/// Validator limits for accepting a text-strategy result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum number of non-null fields.
    pub min_populated_fields: usize,

    /// Minimum mean confidence across non-null fields.
    pub min_mean_confidence: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_populated_fields: 3,
            min_mean_confidence: 0.6,
        }
    }
}

/// Capability provider selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Gemini REST API.
    #[default]
    Gemini,
    /// Deterministic offline responses.
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!(
                "unknown provider: {other} (supported: gemini, mock)"
            )),
        }
    }
}

/// Language-understanding capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Which provider backs both the text and the vision calls.
    pub provider: ProviderKind,

    /// Model name sent to the provider.
    pub model: String,

    /// Provider API base URL.
    pub endpoint: String,

    /// API key. Never written to disk unless explicitly set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            timeout_secs: 30,
            temperature: 0.1,
        }
    }
}

impl CapabilityConfig {
    /// Per-call timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted image payload in bytes.
    pub max_file_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Image preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Longest side after resizing.
    pub max_dimension: u32,

    /// Fraction of darkest/brightest pixels clipped by the contrast stretch.
    pub contrast_clip: f32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            contrast_clip: 0.01,
        }
    }
}

/// Extraction output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Default timezone for date/time interpretation.
    pub timezone: String,

    /// Attach OCR text and layout blocks to the result.
    pub include_raw: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            include_raw: false,
        }
    }
}

/// Recognition model file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "en_rec.onnx".to_string(),
            dictionary: "en_dict.txt".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl PosterConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
