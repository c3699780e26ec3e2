//! Text recognition: engine seam, layout blocks and image preprocessing.

mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;

pub use preprocessing::{ImagePreprocessor, adaptive_threshold};
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;

/// Row height used to group boxes into reading-order lines.
const ROW_BUCKET_PX: f32 = 20.0;

/// A text engine that turns an image into positioned text boxes.
///
/// Implementations are blocking; the pipeline calls them from the tokio
/// blocking pool and shares one instance across requests.
pub trait RecognitionEngine: Send + Sync {
    /// Recognize text in the image. An empty vector is a valid result.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextBox>, RecognitionError>;
}

/// A recognized text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Quadrilateral corners (x1, y1, x2, y2, x3, y3, x4, y4).
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    pub fn new(text: impl Into<String>, bbox: [f32; 8], confidence: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
        }
    }

    /// Build a box from an axis-aligned rectangle.
    pub fn from_rect(text: impl Into<String>, x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Self {
        Self::new(
            text,
            [x, y, x + w, y, x + w, y + h, x, y + h],
            confidence,
        )
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        let x = (self.bbox[0] + self.bbox[2] + self.bbox[4] + self.bbox[6]) / 4.0;
        let y = (self.bbox[1] + self.bbox[3] + self.bbox[5] + self.bbox[7]) / 4.0;
        (x, y)
    }

    /// Get the axis-aligned bounding rectangle (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Vertical third of the poster a block sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Top,
    Middle,
    Bottom,
}

impl Region {
    /// Classify a vertical center against image height thirds.
    pub fn from_center(center_y: f32, image_height: u32) -> Self {
        let height = image_height.max(1) as f32;
        let ratio = center_y / height;
        if ratio < 1.0 / 3.0 {
            Region::Top
        } else if ratio < 2.0 / 3.0 {
            Region::Middle
        } else {
            Region::Bottom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Top => "top",
            Region::Middle => "middle",
            Region::Bottom => "bottom",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text box tagged with its poster region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub text: String,
    pub bbox: [f32; 8],
    pub confidence: f32,
    pub region: Region,
}

/// Tag boxes with regions and return them in reading order.
///
/// Blank boxes are dropped.
pub fn layout_blocks(mut boxes: Vec<TextBox>, image_height: u32) -> Vec<LayoutBlock> {
    boxes.retain(|b| !b.text.trim().is_empty());
    sort_by_reading_order(&mut boxes);

    boxes
        .into_iter()
        .map(|b| {
            let (_, cy) = b.center();
            LayoutBlock {
                region: Region::from_center(cy, image_height),
                text: b.text.trim().to_string(),
                bbox: b.bbox,
                confidence: b.confidence,
            }
        })
        .collect()
}

/// Sort boxes top-to-bottom, then left-to-right within a row.
pub fn sort_by_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect();
        let (bx, by, _, _) = b.rect();

        let row_a = (ay / ROW_BUCKET_PX) as i32;
        let row_b = (by / ROW_BUCKET_PX) as i32;

        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}
