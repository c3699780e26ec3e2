//! Data models for configuration, event fields and extraction results.

pub mod config;
pub mod event;
pub mod result;

pub use config::PosterConfig;
pub use event::{EventFields, ExtraField, Field, FieldName};
pub use result::{ComplexityScore, ExtractionResult, InitialRoute, RawData, Route, Warning, WarningType};
