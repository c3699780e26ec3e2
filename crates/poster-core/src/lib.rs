//! Core library for event poster extraction.
//!
//! This crate provides:
//! - Image complexity analysis and OCR-first / vision routing
//! - Text extraction over a pluggable recognition engine (`pure-onnx-ocr` with the `native` feature)
//! - Vision extraction through a language-model capability (Gemini or mock)
//! - Acceptance validation with a single vision fallback
//! - Normalization of dates, times, phones, emails and URLs

pub mod analysis;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod postprocess;

pub use error::{CapabilityError, PosterError, RecognitionError, Result};
pub use llm::{ExtractionCapability, LanguageModel, MockModel, MockReply};
pub use models::{
    ComplexityScore, EventFields, ExtractionResult, ExtraField, Field, FieldName, InitialRoute,
    PosterConfig, Route, Warning, WarningType,
};
pub use ocr::{LayoutBlock, RecognitionEngine, Region, TextBox};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pipeline::{ExtractionOptions, Pipeline};
