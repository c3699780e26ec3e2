//! Deterministic offline capability.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::CapabilityError;

use super::ExtractionCapability;

/// A canned capability reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this JSON document.
    Json(serde_json::Value),
    /// Return this text verbatim.
    Raw(String),
    /// Reject the credential.
    AuthFailure,
    /// Fail at the transport level.
    TransportFailure,
}

impl MockReply {
    fn produce(&self) -> Result<String, CapabilityError> {
        match self {
            MockReply::Json(value) => Ok(value.to_string()),
            MockReply::Raw(text) => Ok(text.clone()),
            MockReply::AuthFailure => Err(CapabilityError::Auth("mock credential rejected".into())),
            MockReply::TransportFailure => {
                Err(CapabilityError::Transport("mock connection reset".into()))
            }
        }
    }
}

/// Capability returning fixed replies after a simulated latency.
#[derive(Debug, Clone)]
pub struct MockModel {
    text_reply: MockReply,
    vision_reply: MockReply,
    text_latency: Duration,
    vision_latency: Duration,
}

impl MockModel {
    /// Sample conference data with realistic latency.
    pub fn new() -> Self {
        Self {
            text_reply: MockReply::Json(sample_response()),
            vision_reply: MockReply::Json(sample_response()),
            text_latency: Duration::from_millis(500),
            vision_latency: Duration::from_millis(1000),
        }
    }

    /// Fixed replies per mode with no latency.
    pub fn scripted(text_reply: MockReply, vision_reply: MockReply) -> Self {
        Self {
            text_reply,
            vision_reply,
            text_latency: Duration::ZERO,
            vision_latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, text: Duration, vision: Duration) -> Self {
        self.text_latency = text;
        self.vision_latency = vision;
        self
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionCapability for MockModel {
    async fn text_to_json(&self, _prompt: &str) -> Result<String, CapabilityError> {
        if !self.text_latency.is_zero() {
            tokio::time::sleep(self.text_latency).await;
        }
        self.text_reply.produce()
    }

    async fn image_to_json(&self, _image_png: &[u8], _prompt: &str) -> Result<String, CapabilityError> {
        if !self.vision_latency.is_zero() {
            tokio::time::sleep(self.vision_latency).await;
        }
        self.vision_reply.produce()
    }
}

/// The sample document returned by [`MockModel::new`].
pub fn sample_response() -> serde_json::Value {
    json!({
        "fields": {
            "event_name": {"value": "Mock Tech Conference 2026", "confidence": 0.95, "source": "line 1"},
            "date": {"value": "2026-03-15", "confidence": 0.90, "source": "line 2"},
            "time": {"value": "09:00-17:00", "confidence": 0.85, "source": "line 3"},
            "venue_name": {"value": "Convention Center", "confidence": 0.92, "source": "line 4"},
            "venue_address": {"value": "123 Main Street, San Francisco, CA 94105", "confidence": 0.88, "source": "line 5"},
            "description": {"value": "Annual technology conference featuring the latest in AI and ML", "confidence": 0.80, "source": "line 6"},
            "organizer": {"value": "Tech Org Inc", "confidence": 0.75, "source": "line 7"},
            "contact_email": {"value": "info@mocktech.com", "confidence": 0.90, "source": "line 8"},
            "contact_phone": {"value": "(555) 123-4567", "confidence": 0.85, "source": "line 9"},
            "ticket_price": {"value": "$50", "confidence": 0.80, "source": "line 10"},
            "website": {"value": "https://mocktech.com", "confidence": 0.95, "source": "line 11"}
        },
        "extra": [
            {"key": "wifi_available", "value": "Yes", "confidence": 0.70, "source": "line 12"},
            {"key": "refreshments", "value": "Coffee and snacks provided", "confidence": 0.65, "source": "line 13"}
        ]
    })
}
