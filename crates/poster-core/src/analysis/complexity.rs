//! Blur, edge and text density measurements.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use crate::models::config::{AnalysisConfig, RoutingConfig};
use crate::models::result::ComplexityScore;
use crate::ocr::adaptive_threshold;

/// Combines the three measurements into `overall_complexity`.
///
/// Implementations must be increasing in blur (decreasing in
/// `blur_variance`), increasing in `edge_density`, decreasing in
/// `text_density`, and return a value in [0, 1].
pub trait ComplexityPolicy: Send + Sync {
    fn overall(&self, blur_variance: f64, edge_density: f64, text_density: f64) -> f64;
}

/// Weighted sum of a blur signal, edge density and sparse text.
#[derive(Debug, Clone)]
pub struct WeightedComplexity {
    pub blur_weight: f64,
    pub edge_weight: f64,
    pub text_weight: f64,
    /// Variance at which the blur signal is 0.5.
    pub blur_reference: f64,
}

impl WeightedComplexity {
    pub fn from_config(analysis: &AnalysisConfig, routing: &RoutingConfig) -> Self {
        Self {
            blur_weight: analysis.blur_weight,
            edge_weight: analysis.edge_weight,
            text_weight: analysis.text_weight,
            blur_reference: routing.blur_threshold.max(f64::EPSILON),
        }
    }
}

impl ComplexityPolicy for WeightedComplexity {
    fn overall(&self, blur_variance: f64, edge_density: f64, text_density: f64) -> f64 {
        let blur_signal = self.blur_reference / (self.blur_reference + blur_variance.max(0.0));
        let score = self.blur_weight * blur_signal
            + self.edge_weight * edge_density.clamp(0.0, 1.0)
            + self.text_weight * (1.0 - text_density.clamp(0.0, 1.0));
        if score.is_nan() { 1.0 } else { score.clamp(0.0, 1.0) }
    }
}

/// Scores a preprocessed image. The image is never modified.
pub struct ComplexityAnalyzer {
    config: AnalysisConfig,
    blur_threshold: f64,
    policy: Box<dyn ComplexityPolicy>,
}

impl ComplexityAnalyzer {
    /// Create an analyzer with the default weighted policy.
    pub fn new(analysis: &AnalysisConfig, routing: &RoutingConfig) -> Self {
        Self {
            config: analysis.clone(),
            blur_threshold: routing.blur_threshold,
            policy: Box::new(WeightedComplexity::from_config(analysis, routing)),
        }
    }

    /// Replace the weighting policy.
    pub fn with_policy(mut self, policy: Box<dyn ComplexityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Measure the image and combine the measurements.
    pub fn analyze(&self, image: &DynamicImage) -> ComplexityScore {
        let gray = image.to_luma8();

        let blur_variance = laplacian_variance(&gray);
        let edge_density = edge_density(&gray, self.config.canny_low, self.config.canny_high);
        let text_density = text_density(&gray, &self.config);

        let score = self.score(blur_variance, edge_density, text_density);

        debug!(
            blur_variance = score.blur_variance,
            edge_density = score.edge_density,
            text_density = score.text_density,
            overall = score.overall_complexity,
            is_blurry = score.is_blurry,
            "Complexity analysis complete"
        );

        score
    }

    /// Build a score from raw measurements.
    pub fn score(&self, blur_variance: f64, edge_density: f64, text_density: f64) -> ComplexityScore {
        ComplexityScore {
            blur_variance,
            edge_density,
            text_density,
            overall_complexity: self.policy.overall(blur_variance, edge_density, text_density),
            is_blurry: blur_variance < self.blur_threshold,
        }
    }
}

/// Variance of the 4-neighbour 3x3 Laplacian over interior pixels.
fn laplacian_variance(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| image.get_pixel(x, y)[0] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let response = px(x, y - 1) + px(x - 1, y) + px(x + 1, y) + px(x, y + 1) - 4.0 * px(x, y);
            sum += response;
            sum_sq += response * response;
            count += 1;
        }
    }

    let n = count as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Fraction of pixels marked by the Canny detector.
fn edge_density(image: &GrayImage, low: f32, high: f32) -> f64 {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let edges = imageproc::edges::canny(image, low, high);
    let marked = edges.pixels().filter(|p| p[0] > 0).count() as u64;
    marked as f64 / total as f64
}

#[derive(Debug, Clone, Copy)]
struct ComponentStats {
    area: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Fraction of area covered by glyph-sized ink components.
fn text_density(image: &GrayImage, config: &AnalysisConfig) -> f64 {
    let (width, height) = image.dimensions();
    let total = width as u64 * height as u64;
    if total == 0 {
        return 0.0;
    }

    let mask = adaptive_threshold(image, config.threshold_block_radius, config.threshold_offset);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut stats: Vec<Option<ComponentStats>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label[0] as usize;
        if id == 0 {
            continue;
        }
        if stats.len() <= id {
            stats.resize(id + 1, None);
        }
        let entry = stats[id].get_or_insert(ComponentStats {
            area: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        });
        entry.area += 1;
        entry.min_x = entry.min_x.min(x);
        entry.min_y = entry.min_y.min(y);
        entry.max_x = entry.max_x.max(x);
        entry.max_y = entry.max_y.max(y);
    }

    let max_glyph_height = (height as f64 * config.max_glyph_height_ratio).max(1.0);
    let max_glyph_width = max_glyph_height * 3.0;

    let covered: u64 = stats
        .iter()
        .flatten()
        .filter_map(|c| {
            let w = (c.max_x - c.min_x + 1) as f64;
            let h = (c.max_y - c.min_y + 1) as f64;
            let fill = c.area as f64 / (w * h);

            let glyph_sized = c.area >= config.min_glyph_area
                && h <= max_glyph_height
                && w <= max_glyph_width;
            // Solid blocks are shapes, not strokes.
            let stroke_like = fill >= 0.1 && !(fill > 0.95 && w > 2.0 && h > 2.0);

            (glyph_sized && stroke_like).then_some((w * h) as u64)
        })
        .sum();

    (covered as f64 / total as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ComplexityAnalyzer {
        ComplexityAnalyzer::new(&AnalysisConfig::default(), &RoutingConfig::default())
    }

    fn policy() -> WeightedComplexity {
        WeightedComplexity::from_config(&AnalysisConfig::default(), &RoutingConfig::default())
    }

    #[test]
    fn test_overall_increases_with_blur() {
        let p = policy();
        // Lower variance means blurrier.
        assert!(p.overall(20.0, 0.2, 0.4) > p.overall(400.0, 0.2, 0.4));
    }

    #[test]
    fn test_overall_increases_with_edge_density() {
        let p = policy();
        assert!(p.overall(150.0, 0.5, 0.4) > p.overall(150.0, 0.1, 0.4));
    }

    #[test]
    fn test_overall_decreases_with_text_density() {
        let p = policy();
        assert!(p.overall(150.0, 0.2, 0.8) < p.overall(150.0, 0.2, 0.2));
    }

    #[test]
    fn test_overall_is_bounded() {
        let p = policy();
        for &(b, e, t) in &[(0.0, 1.0, 0.0), (1e9, 0.0, 1.0), (-5.0, 2.0, -1.0)] {
            let v = p.overall(b, e, t);
            assert!((0.0..=1.0).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn test_sharp_text_heavy_measurements() {
        let score = analyzer().score(150.0, 0.12, 0.68);
        assert!(!score.is_blurry);
        assert!((score.overall_complexity - 0.264).abs() < 1e-9);
    }

    #[test]
    fn test_flat_image_is_blurry_and_edgeless() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([128])));
        let score = analyzer().analyze(&image);
        assert_eq!(score.blur_variance, 0.0);
        assert!(score.is_blurry);
        assert_eq!(score.edge_density, 0.0);
        assert_eq!(score.text_density, 0.0);
    }

    #[test]
    fn test_strokes_raise_text_density_and_sharpness() {
        let mut img = GrayImage::from_pixel(120, 120, Luma([235]));
        // Rows of small vertical strokes, like lines of text.
        for row in 0..6 {
            let top = 10 + row * 18;
            for col in 0..20 {
                let x = 5 + col * 5;
                for y in top..top + 10 {
                    img.put_pixel(x, y, Luma([15]));
                    img.put_pixel(x + 1, y, Luma([15]));
                }
            }
        }

        let score = analyzer().analyze(&DynamicImage::ImageLuma8(img));
        assert!(score.text_density > 0.0);
        assert!(score.edge_density > 0.0);
        assert!(!score.is_blurry);
    }

    #[test]
    fn test_custom_policy() {
        struct Constant;
        impl ComplexityPolicy for Constant {
            fn overall(&self, _: f64, _: f64, _: f64) -> f64 {
                0.9
            }
        }

        let score = analyzer()
            .with_policy(Box::new(Constant))
            .score(500.0, 0.0, 1.0);
        assert_eq!(score.overall_complexity, 0.9);
    }
}
