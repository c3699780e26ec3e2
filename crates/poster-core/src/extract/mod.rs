//! The two extraction strategies.

mod text;
mod vision;

pub use text::{TextStrategy, annotate_blocks, resolve_source};
pub use vision::VisionStrategy;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{CapabilityError, PosterError, Result};
use crate::llm::{ParsedOutput, parse_response};
use crate::models::event::{EventFields, ExtraField};
use crate::models::result::{RawData, Warning, WarningType};

/// What a strategy produced for one request.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    pub fields: EventFields,
    pub extra: Vec<ExtraField>,
    pub warnings: Vec<Warning>,
    /// The capability output was malformed or timed out.
    pub failed: bool,
    /// OCR text and blocks, text strategy only.
    pub raw: Option<RawData>,
}

impl StrategyOutput {
    fn from_parsed(parsed: ParsedOutput) -> Self {
        Self {
            fields: parsed.fields,
            extra: parsed.extra,
            ..Default::default()
        }
    }

    fn failed(err: &CapabilityError) -> Self {
        Self {
            warnings: vec![Warning::new(WarningType::InvalidJson).with_message(err.to_string())],
            failed: true,
            ..Default::default()
        }
    }
}

/// Run one capability call under a deadline and decode its output.
///
/// Malformed output and timeouts degrade to an empty output with an
/// `invalid_json` warning. Auth and transport errors propagate.
async fn call_capability<F>(call: F, timeout: Duration, strategy: &str) -> Result<StrategyOutput>
where
    F: Future<Output = std::result::Result<String, CapabilityError>>,
{
    let outcome = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(raw)) => parse_response(&raw),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(CapabilityError::Timeout(timeout)),
    };

    match outcome {
        Ok(parsed) => Ok(StrategyOutput::from_parsed(parsed)),
        Err(err) if err.is_recoverable() => {
            warn!(strategy, error = %err, "Capability output unusable");
            Ok(StrategyOutput::failed(&err))
        }
        Err(err) => Err(PosterError::Capability(err)),
    }
}
