//! Parsing of raw capability output into schema fields.

use serde_json::{Map, Value};

use crate::error::CapabilityError;
use crate::models::event::{EventFields, ExtraField, Field, FieldName, clamp_confidence};

/// Fields and extras decoded from one capability response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub fields: EventFields,
    pub extra: Vec<ExtraField>,
}

/// Decode a capability response.
///
/// Markdown code fences around the JSON are tolerated. Anything that is not a
/// JSON object is [`CapabilityError::MalformedOutput`]. Keys under `fields`
/// outside the fixed schema are kept as extras.
pub fn parse_response(raw: &str) -> Result<ParsedOutput, CapabilityError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(CapabilityError::MalformedOutput("empty response".into()));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| CapabilityError::MalformedOutput(format!("invalid JSON: {}", e)))?;

    let Value::Object(root) = value else {
        return Err(CapabilityError::MalformedOutput(
            "top-level value is not an object".into(),
        ));
    };

    let mut output = ParsedOutput::default();

    if let Some(Value::Object(fields)) = root.get("fields") {
        for (key, entry) in fields {
            match FieldName::from_key(key) {
                Some(name) => output.fields.set(name, parse_field(entry)),
                None => {
                    if let Some(extra) = parse_extra_entry(key, entry) {
                        output.extra.push(extra);
                    }
                }
            }
        }
    }

    match root.get("extra") {
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Object(obj) = item {
                    if let Some(Value::String(key)) = obj.get("key") {
                        output.extra.push(ExtraField {
                            key: key.clone(),
                            value: obj.get("value").cloned().unwrap_or(Value::Null),
                            confidence: confidence_of(obj),
                            source: source_of(obj),
                        });
                    }
                }
            }
        }
        Some(Value::Object(map)) => {
            for (key, entry) in map {
                if let Some(extra) = parse_extra_entry(key, entry) {
                    output.extra.push(extra);
                }
            }
        }
        _ => {}
    }

    Ok(output)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_field(entry: &Value) -> Field {
    match entry {
        Value::Object(obj) if obj.contains_key("value") => Field {
            value: obj.get("value").and_then(stringify),
            confidence: confidence_of(obj),
            source: source_of(obj),
        },
        Value::Object(_) | Value::Null => Field::default(),
        other => Field {
            value: stringify(other),
            confidence: 0.0,
            source: String::new(),
        },
    }
}

fn parse_extra_entry(key: &str, entry: &Value) -> Option<ExtraField> {
    match entry {
        Value::Null => None,
        Value::Object(obj) if obj.contains_key("value") => Some(ExtraField {
            key: key.to_string(),
            value: obj.get("value").cloned().unwrap_or(Value::Null),
            confidence: confidence_of(obj),
            source: source_of(obj),
        }),
        other => Some(ExtraField {
            key: key.to_string(),
            value: other.clone(),
            confidence: 0.0,
            source: String::new(),
        }),
    }
}

/// Render a JSON value as a field string. Blank strings count as absent.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

fn confidence_of(obj: &Map<String, Value>) -> f32 {
    let raw = match obj.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
        Some(Value::String(s)) => s.trim().parse::<f32>().unwrap_or(0.0),
        _ => 0.0,
    };
    clamp_confidence(raw)
}

fn source_of(obj: &Map<String, Value>) -> String {
    match obj.get("source") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}
