//! Yandex SpeechKit recognizer adapter

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{RecognitionError, RecognitionOutcome, Recognizer};
use crate::domain::audio::AudioSnapshot;
use crate::domain::config::YandexConfig;
use crate::domain::error::ConfigurationError;

/// Yandex SpeechKit REST endpoint
const API_BASE_URL: &str = "https://stt.api.cloud.yandex.net";

/// Default recognition topic (model)
const DEFAULT_TOPIC: &str = "general";

/// Response body of the stt:recognize call
#[derive(Debug, Deserialize)]
struct SpeechKitResponse {
    result: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
}

/// Yandex SpeechKit recognizer.
///
/// Ships the captured PCM as a raw LPCM body with `Api-Key` header auth;
/// language, topic and sample rate go as query parameters.
#[derive(Debug)]
pub struct YandexRecognizer {
    api_key: String,
    language: String,
    topic: String,
    sample_rate_hz: u32,
    base_url: String,
    client: reqwest::Client,
}

impl YandexRecognizer {
    /// Create a recognizer from provider configuration.
    ///
    /// Fails with [`ConfigurationError::MissingCredential`] when no API key
    /// is configured; no network I/O happens here.
    pub fn new(
        config: &YandexConfig,
        language: &str,
        sample_rate_hz: u32,
    ) -> Result<Self, ConfigurationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigurationError::MissingCredential("yandex"))?
            .to_string();

        Ok(Self {
            api_key,
            language: normalize_language(language),
            topic: config
                .topic
                .clone()
                .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
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

    /// Build the request URL with query parameters
    fn request_url(&self) -> String {
        format!(
            "{}/speech/v1/stt:recognize?topic={}&lang={}&format=lpcm&sampleRateHertz={}",
            self.base_url, self.topic, self.language, self.sample_rate_hz
        )
    }

    /// The snapshot must already be in the configured wire format
    fn check_format(&self, audio: &AudioSnapshot) -> Result<(), RecognitionError> {
        let format = audio.format();
        if format.sample_rate_hz() != self.sample_rate_hz
            || format.channels() != 1
            || format.bytes_per_sample() != 2
        {
            return Err(RecognitionError::UnsupportedFormat {
                provider: "yandex",
                detail: format!(
                    "expected {} Hz mono 16-bit LPCM, got {}",
                    self.sample_rate_hz, format
                ),
            });
        }
        Ok(())
    }
}

/// Map bare language codes to the full codes SpeechKit expects
fn normalize_language(language: &str) -> String {
    match language.trim() {
        "ru" => "ru-RU".to_string(),
        "en" => "en-US".to_string(),
        "tr" => "tr-TR".to_string(),
        "kk" => "kk-KK".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Recognizer for YandexRecognizer {
    async fn recognize(
        &self,
        audio: &AudioSnapshot,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        self.check_format(audio)?;

        let url = self.request_url();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .body(audio.data().to_vec())
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

        let response: SpeechKitResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::ParseError(e.to_string()))?;

        if let Some(message) = response.error_message {
            let code = response.error_code.unwrap_or_default();
            return Err(RecognitionError::ApiError(format!("{} {}", code, message).trim().to_string()));
        }

        let text = response
            .result
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RecognitionError::EmptyResult)?;

        Ok(RecognitionOutcome::from_text(text))
    }

    fn name(&self) -> &'static str {
        "yandex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::AudioFormat;

    fn config() -> YandexConfig {
        YandexConfig {
            api_key: Some("yc-key".to_string()),
            topic: None,
        }
    }

    #[test]
    fn missing_api_key_fails_at_construction() {
        let err = YandexRecognizer::new(&YandexConfig::default(), "ru-RU", 16_000).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingCredential("yandex"));
    }

    #[test]
    fn request_url_carries_query_parameters() {
        let recognizer = YandexRecognizer::new(&config(), "ru-RU", 16_000).unwrap();
        let url = recognizer.request_url();
        assert!(url.contains("stt:recognize"));
        assert!(url.contains("topic=general"));
        assert!(url.contains("lang=ru-RU"));
        assert!(url.contains("format=lpcm"));
        assert!(url.contains("sampleRateHertz=16000"));
    }

    #[test]
    fn bare_language_codes_are_normalized() {
        assert_eq!(normalize_language("ru"), "ru-RU");
        assert_eq!(normalize_language("en"), "en-US");
        assert_eq!(normalize_language("tr"), "tr-TR");
        // Full codes pass through untouched
        assert_eq!(normalize_language("de-DE"), "de-DE");
    }

    #[test]
    fn custom_topic_is_used() {
        let custom = YandexConfig {
            api_key: Some("yc-key".to_string()),
            topic: Some("maps".to_string()),
        };
        let recognizer = YandexRecognizer::new(&custom, "ru", 16_000).unwrap();
        assert!(recognizer.request_url().contains("topic=maps"));
    }

    #[test]
    fn mismatched_format_is_unsupported() {
        let recognizer = YandexRecognizer::new(&config(), "ru-RU", 16_000).unwrap();
        let audio = AudioSnapshot::from_bytes(vec![0u8; 8], AudioFormat::new(8_000, 1, 2));
        assert!(matches!(
            recognizer.check_format(&audio),
            Err(RecognitionError::UnsupportedFormat { provider: "yandex", .. })
        ));
    }
}
