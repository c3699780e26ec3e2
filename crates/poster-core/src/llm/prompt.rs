//! Extraction prompt contract shared by the text and vision calls.

use crate::models::event::FieldName;

const EXAMPLE_FIELDS: &str = r#"{
  "fields": {
    "event_name": {"value": "Conference Title", "confidence": 0.95, "source": "line 1"},
    "date": {"value": "2026-03-15", "confidence": 0.90, "source": "line 2"},
    "time": {"value": "09:00-17:00", "confidence": 0.85, "source": "line 3"},
    "venue_name": {"value": "Convention Center", "confidence": 0.92, "source": "line 4"},
    "venue_address": {"value": "123 Main St, City, State", "confidence": 0.88, "source": "line 5"},
    "description": {"value": "Event description", "confidence": 0.80, "source": "line 6"},
    "organizer": {"value": "Organizing Entity", "confidence": 0.75, "source": "line 10"},
    "contact_email": {"value": "info@event.com", "confidence": 0.90, "source": "line 11"},
    "contact_phone": {"value": "(555) 123-4567", "confidence": 0.85, "source": "line 12"},
    "ticket_price": {"value": "$50", "confidence": 0.80, "source": "line 13"},
    "website": {"value": "https://event.com", "confidence": 0.95, "source": "line 14"},
    "registration_link": {"value": "https://event.com/register", "confidence": 0.90, "source": "line 15"}
  },
  "extra": [
    {"key": "dress_code", "value": "Business casual", "confidence": 0.70, "source": "line 16"}
  ]
}"#;

/// Build the extraction prompt.
///
/// `context` carries the region-annotated OCR text for text calls and is
/// `None` for image calls.
pub fn extraction_prompt(context: Option<&str>, timezone: &str) -> String {
    let core_fields = FieldName::ALL
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "Extract event information from the provided content and return ONLY a JSON object with this structure:\n\n\
         {EXAMPLE_FIELDS}\n\n\
         RULES:\n\
         1. Use timezone {timezone} for date/time interpretation.\n\
         2. Use null for fields that are not present.\n\
         3. Confidence is 0.0-1.0 based on text clarity and certainty.\n\
         4. Source references where the value was found (\"line 3\", \"top banner\").\n\
         5. Core fields belong in \"fields\": {core_fields}.\n\
         6. Any other information goes in the \"extra\" array as key/value entries.\n\
         7. Return ONLY valid JSON with no markdown and no commentary.\n\
         8. Prefer ISO 8601 dates (YYYY-MM-DD) and 24-hour times (HH:MM or HH:MM-HH:MM).\n"
    );

    if let Some(context) = context {
        prompt.push_str("\nOCR text (each line is prefixed with its poster region and line number):\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    prompt.push_str("\nReturn ONLY the JSON object.");
    prompt
}
