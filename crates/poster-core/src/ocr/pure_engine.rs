//! Recognition engine backed by `pure-onnx-ocr`.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::RecognitionError;
use crate::models::config::PosterConfig;

use super::{RecognitionEngine, TextBox};

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl PureOcrEngine {
    /// Load the detection model, recognition model and dictionary from a directory.
    pub fn from_dir(
        model_dir: &Path,
        det_model: &str,
        rec_model: &str,
        dictionary: &str,
    ) -> Result<Self, RecognitionError> {
        let det_path = model_dir.join(det_model);
        let rec_path = model_dir.join(rec_model);
        let dict_path = model_dir.join(dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(RecognitionError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| RecognitionError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self { engine })
    }

    /// Load the engine using the model file names in the configuration.
    pub fn from_config(config: &PosterConfig) -> Result<Self, RecognitionError> {
        Self::from_dir(
            &config.models.model_dir,
            &config.models.detection_model,
            &config.models.recognition_model,
            &config.models.dictionary,
        )
    }
}

impl RecognitionEngine for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextBox>, RecognitionError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| RecognitionError::Failed(format!("pure-onnx-ocr: {}", e)))?;

        let boxes: Vec<TextBox> = results
            .iter()
            .map(|r| TextBox::new(r.text.replace("[UNK]", " "), polygon_to_bbox(&r.bounding_box), r.confidence))
            .collect();

        debug!(
            "Recognized {} text boxes in {}x{} image in {}ms",
            boxes.len(),
            width,
            height,
            start.elapsed().as_millis()
        );

        Ok(boxes)
    }
}

/// Convert a `Polygon<f64>` to the `[f32; 8]` quadrilateral format.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_report_model_load() {
        let err = PureOcrEngine::from_dir(
            Path::new("/nonexistent/models"),
            "det.onnx",
            "en_rec.onnx",
            "en_dict.txt",
        )
        .err()
        .unwrap();
        assert!(matches!(err, RecognitionError::ModelLoad(_)));
    }
}
