//! Error types for the poster-core library.

use thiserror::Error;

/// Main error type for the poster library.
#[derive(Error, Debug)]
pub enum PosterError {
    /// Recognition engine error.
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Language-understanding capability error.
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request payload was rejected before extraction started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PosterError {
    /// Whether the error is a credential problem that must reach the caller.
    pub fn is_auth(&self) -> bool {
        matches!(self, PosterError::Capability(CapabilityError::Auth(_)))
    }
}

/// Errors raised by the text-recognition engine.
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// Failed to load recognition models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The engine is not available for this request.
    #[error("recognition engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but failed on this image.
    #[error("recognition failed: {0}")]
    Failed(String),
}

/// Errors raised by a language-understanding capability call.
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// The response was not valid structured data.
    #[error("malformed capability output: {0}")]
    MalformedOutput(String),

    /// The credential was missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The call exceeded its time budget.
    #[error("capability call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Connection failure or an unexpected HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
}

impl CapabilityError {
    /// Soft failures degrade the strategy result instead of failing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CapabilityError::MalformedOutput(_) | CapabilityError::Timeout(_)
        )
    }
}

/// Result type for the poster library.
pub type Result<T> = std::result::Result<T, PosterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_recoverable_capability_errors() {
        assert!(CapabilityError::MalformedOutput("x".into()).is_recoverable());
        assert!(CapabilityError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(!CapabilityError::Auth("bad key".into()).is_recoverable());
        assert!(!CapabilityError::Transport("reset".into()).is_recoverable());
    }

    #[test]
    fn test_auth_detection() {
        let err: PosterError = CapabilityError::Auth("missing api key".into()).into();
        assert!(err.is_auth());
        assert_eq!(
            err.to_string(),
            "capability error: authentication failed: missing api key"
        );

        let err: PosterError = RecognitionError::Failed("boom".into()).into();
        assert!(!err.is_auth());
    }
}
