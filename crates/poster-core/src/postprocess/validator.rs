//! Acceptance rules for extracted fields.

use crate::models::config::ValidationConfig;
use crate::models::event::{EventFields, FieldName};
use crate::models::result::{Warning, WarningType};

/// Slack on the mean-confidence limit so two-decimal confidences that average
/// exactly to the limit are accepted.
const CONFIDENCE_TOLERANCE: f64 = 1e-6;

/// Why a set of fields was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Critical fields with a null value.
    MissingCritical(Vec<FieldName>),
    /// Fewer non-null fields than required.
    TooFewFields { found: usize, required: usize },
    /// Mean confidence of non-null fields below the limit.
    LowConfidence { mean: f32, required: f32 },
}

impl Rejection {
    /// Convert into a result warning.
    pub fn to_warning(&self) -> Warning {
        match self {
            Rejection::MissingCritical(fields) => Warning::new(WarningType::MissingCriticalField)
                .with_fields(fields)
                .with_message(format!(
                    "Missing critical fields: {}",
                    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
                )),
            Rejection::TooFewFields { found, required } => Warning::new(WarningType::LowConfidence)
                .with_message(format!(
                    "Only {found} fields extracted, at least {required} expected"
                )),
            Rejection::LowConfidence { mean, .. } => Warning::new(WarningType::LowConfidence)
                .with_confidence(*mean)
                .with_message(format!("Overall confidence is low ({mean:.2})")),
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub accepted: bool,
    /// Every rule that failed, in rule order.
    pub reasons: Vec<Rejection>,
}

impl Validation {
    pub fn to_warnings(&self) -> Vec<Warning> {
        self.reasons.iter().map(Rejection::to_warning).collect()
    }
}

/// Decides whether a text-strategy result is good enough.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Check every rule and collect all failures.
    pub fn validate(&self, fields: &EventFields) -> Validation {
        let mut reasons = Vec::new();

        let missing = fields.missing_critical();
        if !missing.is_empty() {
            reasons.push(Rejection::MissingCritical(missing));
        }

        let found = fields.present_count();
        if found < self.config.min_populated_fields {
            reasons.push(Rejection::TooFewFields {
                found,
                required: self.config.min_populated_fields,
            });
        }

        let mean = fields.mean_confidence().unwrap_or(0.0);
        let required = self.config.min_mean_confidence;
        if mean + CONFIDENCE_TOLERANCE < f64::from(required) {
            reasons.push(Rejection::LowConfidence {
                mean: mean as f32,
                required,
            });
        }

        Validation {
            accepted: reasons.is_empty(),
            reasons,
        }
    }
}
