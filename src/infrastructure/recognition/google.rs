//! Google Cloud Speech-to-Text recognizer adapter

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    Alternative, RecognitionError, RecognitionOutcome, Recognizer,
};
use crate::domain::audio::AudioSnapshot;
use crate::domain::config::GoogleConfig;
use crate::domain::error::ConfigurationError;

/// Google Cloud Speech REST endpoint
const API_BASE_URL: &str = "https://speech.googleapis.com/v1";

/// Default recognition model
const DEFAULT_MODEL: &str = "default";

// Request types for the speech:recognize call

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

// Response types

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    results: Option<Vec<SpeechResult>>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct SpeechResult {
    alternatives: Option<Vec<SpeechAlternative>>,
}

#[derive(Debug, Deserialize)]
struct SpeechAlternative {
    transcript: Option<String>,
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    message: String,
}

/// Google Cloud Speech recognizer.
///
/// Sends the captured PCM as base64 LINEAR16 content; the sample rate and
/// language are fixed at construction and the input snapshot must match
/// them (no silent resampling).
#[derive(Debug)]
pub struct GoogleRecognizer {
    api_key: String,
    language: String,
    model: String,
    sample_rate_hz: u32,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleRecognizer {
    /// Create a recognizer from provider configuration.
    ///
    /// Fails with [`ConfigurationError::MissingCredential`] when no API key
    /// is configured; no network I/O happens here.
    pub fn new(
        config: &GoogleConfig,
        language: &str,
        sample_rate_hz: u32,
    ) -> Result<Self, ConfigurationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigurationError::MissingCredential("google"))?
            .to_string();

        Ok(Self {
            api_key,
            language: language.to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            sample_rate_hz,
            base_url: API_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Override the API base URL (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the request URL
    fn request_url(&self) -> String {
        format!("{}/speech:recognize?key={}", self.base_url, self.api_key)
    }

    /// Build the request body
    fn build_request(&self, audio: &AudioSnapshot) -> RecognizeRequest {
        RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: self.sample_rate_hz,
                language_code: self.language.clone(),
                model: self.model.clone(),
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(audio.data()),
            },
        }
    }

    /// Pull the outcome out of a response; `None` when no transcript came back
    fn extract_outcome(response: &RecognizeResponse) -> Option<RecognitionOutcome> {
        let alternatives: Vec<Alternative> = response
            .results
            .as_ref()?
            .first()?
            .alternatives
            .as_ref()?
            .iter()
            .filter_map(|alt| {
                let text = alt.transcript.as_deref()?.trim();
                if text.is_empty() {
                    return None;
                }
                Some(Alternative {
                    text: text.to_string(),
                    confidence: alt.confidence,
                })
            })
            .collect();

        let best = alternatives.first()?.text.clone();
        Some(RecognitionOutcome {
            text: best,
            alternatives,
        })
    }

    /// The snapshot must already be in the configured wire format
    fn check_format(&self, audio: &AudioSnapshot) -> Result<(), RecognitionError> {
        let format = audio.format();
        if format.sample_rate_hz() != self.sample_rate_hz
            || format.channels() != 1
            || format.bytes_per_sample() != 2
        {
            return Err(RecognitionError::UnsupportedFormat {
                provider: "google",
                detail: format!(
                    "expected {} Hz mono 16-bit LINEAR16, got {}",
                    self.sample_rate_hz, format
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Recognizer for GoogleRecognizer {
    async fn recognize(
        &self,
        audio: &AudioSnapshot,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        self.check_format(audio)?;

        let url = self.request_url();
        let body = self.build_request(audio);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecognitionError::TransportFailure(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RecognitionError::InvalidCredential);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(RecognitionError::TransportFailure(format!("HTTP {}", status)));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecognitionError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let response: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::ParseError(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(RecognitionError::ApiError(error.message));
        }

        Self::extract_outcome(&response).ok_or(RecognitionError::EmptyResult)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}
