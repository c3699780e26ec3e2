//! Image preprocessing: decode, size checks, resize, grayscale, contrast.

use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma};
use tracing::debug;

use crate::error::{PosterError, Result};
use crate::models::config::{LimitsConfig, PreprocessingConfig};

/// Turns uploaded bytes into the grayscale image every later stage reads.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Longest side after resizing.
    max_dimension: u32,
    /// Fraction of pixels clipped at each end by the contrast stretch.
    contrast_clip: f32,
    /// Maximum accepted payload in bytes.
    max_file_size: usize,
}

impl ImagePreprocessor {
    pub fn new(preprocessing: &PreprocessingConfig, limits: &LimitsConfig) -> Self {
        Self {
            max_dimension: preprocessing.max_dimension.max(1),
            contrast_clip: preprocessing.contrast_clip.clamp(0.0, 0.49),
            max_file_size: limits.max_file_size,
        }
    }

    /// Decode and normalize an uploaded image.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(PosterError::InvalidInput("empty image payload".into()));
        }
        if bytes.len() > self.max_file_size {
            return Err(PosterError::InvalidInput(format!(
                "image is {} bytes, limit is {} bytes",
                bytes.len(),
                self.max_file_size
            )));
        }

        let format = image::guess_format(bytes)
            .map_err(|_| PosterError::InvalidInput("unrecognized image format".into()))?;
        if !matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP
        ) {
            return Err(PosterError::InvalidInput(format!(
                "unsupported image format: {:?}",
                format
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| PosterError::InvalidInput(format!("failed to decode image: {}", e)))?;

        let (orig_width, orig_height) = image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Err(PosterError::InvalidInput("image has no pixels".into()));
        }

        let (width, height) = calculate_resize_dimensions(orig_width, orig_height, self.max_dimension);
        let resized = if (width, height) == (orig_width, orig_height) {
            image
        } else {
            image.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
        };

        let gray = stretch_contrast(&resized.to_luma8(), self.contrast_clip);

        debug!(
            "Preprocessed {:?} image {}x{} -> {}x{}",
            format, orig_width, orig_height, width, height
        );

        Ok(DynamicImage::ImageLuma8(gray))
    }
}

/// Fit within `target_size` on the longest side, keeping aspect ratio.
fn calculate_resize_dimensions(width: u32, height: u32, target_size: u32) -> (u32, u32) {
    let max_dim = width.max(height);

    if max_dim <= target_size {
        return (width, height);
    }

    let scale = target_size as f32 / max_dim as f32;
    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;

    (new_width.max(1), new_height.max(1))
}

/// Linear contrast stretch between the `clip` and `1 - clip` percentiles.
fn stretch_contrast(image: &GrayImage, clip: f32) -> GrayImage {
    let mut histogram = [0u64; 256];
    for p in image.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let total = image.width() as u64 * image.height() as u64;
    let cut = (total as f64 * clip as f64) as u64;

    let low = percentile(&histogram, cut);
    let high = 255 - percentile_rev(&histogram, cut);

    if high <= low {
        return image.clone();
    }

    let range = (high - low) as f32;
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, p) in image.enumerate_pixels() {
        let v = (p[0].saturating_sub(low) as f32 * 255.0 / range).min(255.0);
        out.put_pixel(x, y, Luma([v.round() as u8]));
    }
    out
}

fn percentile(histogram: &[u64; 256], cut: u64) -> u8 {
    let mut seen = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > cut {
            return value as u8;
        }
    }
    255
}

fn percentile_rev(histogram: &[u64; 256], cut: u64) -> u8 {
    let mut seen = 0u64;
    for (offset, count) in histogram.iter().rev().enumerate() {
        seen += count;
        if seen > cut {
            return offset as u8;
        }
    }
    255
}

/// Mark pixels darker than their local mean minus `offset` as ink (255).
///
/// The window is `(2 * block_radius + 1)` square, clipped at the borders.
/// Local sums come from an integral image so the cost is independent of the
/// window size.
pub fn adaptive_threshold(image: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return result;
    }

    let stride = width as usize + 1;
    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let y0 = y.saturating_sub(block_radius) as usize;
            let y1 = (y + block_radius + 1).min(height) as usize;
            let x0 = x.saturating_sub(block_radius) as usize;
            let x1 = (x + block_radius + 1).min(width) as usize;

            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as u64;

            let mean = (sum / count) as i32;
            let pixel_value = image.get_pixel(x, y)[0] as i32;

            let output = if pixel_value < mean - offset { 255 } else { 0 };
            result.put_pixel(x, y, Luma([output]));
        }
    }

    result
}
