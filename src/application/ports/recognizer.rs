//! Recognition port interface

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audio::AudioSnapshot;
use crate::domain::config::VoiceSettings;
use crate::domain::error::ConfigurationError;

/// Recognition errors
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    #[error("Audio format not supported by {provider}: {detail}")]
    UnsupportedFormat {
        provider: &'static str,
        detail: String,
    },

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Recognition returned no text")]
    EmptyResult,

    #[error("A recognition task is already in progress")]
    AlreadyInProgress,

    #[error("Invalid or rejected credential")]
    InvalidCredential,

    #[error("Provider error: {0}")]
    ApiError(String),

    #[error("Failed to parse provider response: {0}")]
    ParseError(String),
}

/// One alternative reading of the audio
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub text: String,
    pub confidence: Option<f32>,
}

/// Result of a successful recognition call
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    /// The best transcript
    pub text: String,
    /// Further candidates, best first, when the provider reports any
    pub alternatives: Vec<Alternative>,
}

impl RecognitionOutcome {
    /// Build an outcome carrying just the best transcript
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alternatives: Vec::new(),
        }
    }
}

/// Port for speech recognition providers.
///
/// Implementations encapsulate their own transport, auth and model
/// details; configuration is validated when the adapter is constructed,
/// never during a call.
#[async_trait]
pub trait Recognizer: Send + Sync + std::fmt::Debug {
    /// Turn a finalized audio snapshot into text.
    ///
    /// Adapters convert the PCM input into whatever wire or model format
    /// their backend needs; when the backend cannot accept the audio
    /// format they fail with [`RecognitionError::UnsupportedFormat`]
    /// instead of resampling or truncating.
    async fn recognize(&self, audio: &AudioSnapshot) -> Result<RecognitionOutcome, RecognitionError>;

    /// Short provider name for logs and error messages
    fn name(&self) -> &'static str;
}

/// Port for building a recognizer from settings.
///
/// Selection and construction fail fast with [`ConfigurationError`]
/// before any recording is allowed to start.
pub trait RecognizerFactory: Send + Sync {
    fn create(&self, settings: &VoiceSettings) -> Result<Arc<dyn Recognizer>, ConfigurationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_text() {
        let outcome = RecognitionOutcome::from_text("hello");
        assert_eq!(outcome.text, "hello");
        assert!(outcome.alternatives.is_empty());
    }

    #[test]
    fn error_messages() {
        let err = RecognitionError::UnsupportedFormat {
            provider: "local",
            detail: "expected 16000 Hz".into(),
        };
        assert!(err.to_string().contains("local"));
        assert!(err.to_string().contains("16000"));

        assert!(RecognitionError::AlreadyInProgress
            .to_string()
            .contains("already in progress"));
    }
}
