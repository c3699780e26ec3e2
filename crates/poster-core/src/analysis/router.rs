//! Initial route selection.

use crate::models::config::RoutingConfig;
use crate::models::result::{ComplexityScore, InitialRoute};

/// Pick the initial route for a scored image.
///
/// Blurry or busy images go straight to vision. Sharp images dense with text
/// go OCR-first. Everything else defaults to vision.
pub fn route(score: &ComplexityScore, config: &RoutingConfig) -> InitialRoute {
    if score.is_blurry || score.overall_complexity > config.complexity_threshold {
        InitialRoute::Vision
    } else if score.text_density > config.text_density_threshold {
        InitialRoute::OcrFirst
    } else {
        InitialRoute::Vision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(blur_variance: f64, text_density: f64, overall: f64, is_blurry: bool) -> ComplexityScore {
        ComplexityScore {
            blur_variance,
            edge_density: 0.1,
            text_density,
            overall_complexity: overall,
            is_blurry,
        }
    }

    #[test]
    fn test_blurry_always_vision() {
        let config = RoutingConfig::default();
        for text in [0.0, 0.3, 0.51, 0.9, 1.0] {
            for overall in [0.0, 0.3, 0.7, 1.0] {
                assert_eq!(
                    route(&score(10.0, text, overall, true), &config),
                    InitialRoute::Vision
                );
            }
        }
    }

    #[test]
    fn test_sharp_dense_simple_is_ocr_first() {
        let config = RoutingConfig::default();
        for text in [0.51, 0.7, 1.0] {
            for overall in [0.0, 0.35, 0.7] {
                assert_eq!(
                    route(&score(300.0, text, overall, false), &config),
                    InitialRoute::OcrFirst
                );
            }
        }
    }

    #[test]
    fn test_complex_or_sparse_is_vision() {
        let config = RoutingConfig::default();
        assert_eq!(route(&score(300.0, 0.9, 0.71, false), &config), InitialRoute::Vision);
        assert_eq!(route(&score(300.0, 0.5, 0.2, false), &config), InitialRoute::Vision);
    }

    #[test]
    fn test_sharp_text_heavy_poster() {
        let analyzer = crate::analysis::ComplexityAnalyzer::new(
            &crate::models::config::AnalysisConfig::default(),
            &RoutingConfig::default(),
        );
        let s = analyzer.score(150.0, 0.12, 0.68);
        assert!(!s.is_blurry);
        assert_eq!(route(&s, &RoutingConfig::default()), InitialRoute::OcrFirst);
    }
}
