//! Google Gemini REST client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::CapabilityError;
use crate::models::config::CapabilityConfig;

use super::ExtractionCapability;

/// Gemini `generateContent` client.
///
/// The inner `reqwest::Client` pools connections and is shared by all
/// requests.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a client. A missing or blank key is an authentication failure.
    pub fn new(config: &CapabilityConfig, api_key: Option<&str>) -> Result<Self, CapabilityError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CapabilityError::Auth("Gemini API key is required".into()))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("poster/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| CapabilityError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            temperature: config.temperature,
            timeout: config.timeout(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> CapabilityError {
        if err.is_timeout() {
            CapabilityError::Timeout(self.timeout)
        } else {
            CapabilityError::Transport(err.to_string())
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(&self, parts: Vec<Value>) -> Value {
        json!({
            "contents": [{"parts": parts}],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json"
            }
        })
    }

    async fn generate(&self, parts: Vec<Value>) -> Result<String, CapabilityError> {
        let body = self.request_body(parts);

        debug!(model = %self.model, "Calling Gemini generateContent");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| CapabilityError::MalformedOutput(format!("unexpected response envelope: {}", e)))?;

        let output: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(chars = output.len(), "Gemini response received");

        Ok(output)
    }
}

#[async_trait]
impl ExtractionCapability for GeminiClient {
    async fn text_to_json(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.generate(vec![json!({"text": prompt})]).await
    }

    async fn image_to_json(&self, image_png: &[u8], prompt: &str) -> Result<String, CapabilityError> {
        let parts = vec![
            json!({
                "inline_data": {
                    "mime_type": "image/png",
                    "data": STANDARD.encode(image_png)
                }
            }),
            json!({"text": prompt}),
        ];
        self.generate(parts).await
    }
}

/// Map a non-success HTTP status to a capability error.
fn classify_status(status: StatusCode, body: &str) -> CapabilityError {
    let auth_rejected = status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || (status == StatusCode::BAD_REQUEST && body.contains("API key not valid"));

    if auth_rejected {
        CapabilityError::Auth(format!("Gemini rejected the API key (HTTP {})", status.as_u16()))
    } else {
        let snippet: String = body.chars().take(200).collect();
        CapabilityError::Transport(format!("HTTP {}: {}", status.as_u16(), snippet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_auth_error() {
        let config = CapabilityConfig::default();
        assert!(matches!(
            GeminiClient::new(&config, None),
            Err(CapabilityError::Auth(_))
        ));
        assert!(matches!(
            GeminiClient::new(&config, Some("   ")),
            Err(CapabilityError::Auth(_))
        ));
    }

    #[test]
    fn test_url_and_body() {
        let config = CapabilityConfig {
            endpoint: "https://example.test/v1beta/".into(),
            ..Default::default()
        };
        let client = GeminiClient::new(&config, Some("k")).unwrap();
        assert_eq!(
            client.url(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let body = client.request_body(vec![json!({"text": "hi"})]);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            CapabilityError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, r#"{"error": {"message": "API key not valid. Please pass a valid API key."}}"#),
            CapabilityError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad payload"),
            CapabilityError::Transport(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
            CapabilityError::Transport(_)
        ));
    }
}
