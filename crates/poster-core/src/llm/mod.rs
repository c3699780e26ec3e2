//! Language-understanding capability: providers, prompt and response parsing.

mod gemini;
mod mock;
mod prompt;
mod response;

pub use gemini::GeminiClient;
pub use mock::{MockModel, MockReply, sample_response};
pub use prompt::extraction_prompt;
pub use response::{ParsedOutput, parse_response};

use async_trait::async_trait;
use tracing::info;

use crate::error::CapabilityError;
use crate::models::config::{CapabilityConfig, ProviderKind};

/// A model that turns a prompt (and optionally an image) into raw
/// structured text.
#[async_trait]
pub trait ExtractionCapability: Send + Sync {
    /// Text mode: the OCR context is already part of the prompt.
    async fn text_to_json(&self, prompt: &str) -> Result<String, CapabilityError>;

    /// Image mode: `image_png` is a PNG-encoded image.
    async fn image_to_json(&self, image_png: &[u8], prompt: &str) -> Result<String, CapabilityError>;
}

/// The configured capability provider.
#[derive(Debug, Clone)]
pub enum LanguageModel {
    Gemini(GeminiClient),
    Mock(MockModel),
}

impl LanguageModel {
    /// Build the provider named in the configuration.
    ///
    /// `api_key` overrides `config.api_key` when given.
    pub fn from_config(
        config: &CapabilityConfig,
        api_key: Option<&str>,
    ) -> Result<Self, CapabilityError> {
        let model = match config.provider {
            ProviderKind::Gemini => {
                let key = api_key.or(config.api_key.as_deref());
                LanguageModel::Gemini(GeminiClient::new(config, key)?)
            }
            ProviderKind::Mock => LanguageModel::Mock(MockModel::new()),
        };
        info!("Using {} capability provider", model.name());
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LanguageModel::Gemini(_) => "gemini",
            LanguageModel::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl ExtractionCapability for LanguageModel {
    async fn text_to_json(&self, prompt: &str) -> Result<String, CapabilityError> {
        match self {
            LanguageModel::Gemini(client) => client.text_to_json(prompt).await,
            LanguageModel::Mock(mock) => mock.text_to_json(prompt).await,
        }
    }

    async fn image_to_json(&self, image_png: &[u8], prompt: &str) -> Result<String, CapabilityError> {
        match self {
            LanguageModel::Gemini(client) => client.image_to_json(image_png, prompt).await,
            LanguageModel::Mock(mock) => mock.image_to_json(image_png, prompt).await,
        }
    }
}
