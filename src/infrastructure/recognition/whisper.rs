//! Local whisper.cpp recognizer adapter
//!
//! Runs inference through the whisper-rs bindings. The model is loaded at
//! construction time, so a bad model path fails before any recording is
//! allowed to start. Whisper expects 16 kHz mono f32 input; any other
//! snapshot format is rejected as unsupported rather than resampled here.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::application::ports::{RecognitionError, RecognitionOutcome, Recognizer};
use crate::domain::audio::AudioSnapshot;
use crate::domain::config::LocalConfig;
use crate::domain::error::ConfigurationError;

/// The only sample rate whisper.cpp accepts
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Local whisper.cpp recognizer
#[derive(Debug)]
pub struct WhisperRecognizer {
    ctx: Arc<WhisperContext>,
    language: String,
    threads: i32,
}

impl WhisperRecognizer {
    /// Load the model and create a recognizer.
    ///
    /// Fails with [`ConfigurationError::InvalidPath`] when the model path
    /// is missing, does not exist, or cannot be loaded.
    pub fn new(config: &LocalConfig, language: &str) -> Result<Self, ConfigurationError> {
        let model_path = config
            .model_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| ConfigurationError::InvalidPath("<unset>".to_string()))?;

        if !Path::new(model_path).exists() {
            return Err(ConfigurationError::InvalidPath(model_path.to_string()));
        }

        tracing::info!(model = model_path, "loading whisper model");
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
            .map_err(|e| {
                ConfigurationError::InvalidPath(format!("{} ({})", model_path, e))
            })?;

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f32(),
            "whisper model loaded"
        );

        let threads = num_cpus::get().min(4) as i32;

        Ok(Self {
            ctx: Arc::new(ctx),
            language: language.to_string(),
            threads,
        })
    }

    /// Convert little-endian 16-bit PCM bytes to normalized f32 samples
    fn pcm16_to_f32(pcm: &[u8]) -> Vec<f32> {
        pcm.chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect()
    }

    /// Whisper model language code, e.g. "en" out of "en-US"
    fn model_language(&self) -> String {
        self.language
            .split('-')
            .next()
            .unwrap_or(&self.language)
            .to_lowercase()
    }
}

#[async_trait]
impl Recognizer for WhisperRecognizer {
    async fn recognize(
        &self,
        audio: &AudioSnapshot,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        let format = audio.format();
        if format.sample_rate_hz() != WHISPER_SAMPLE_RATE
            || format.channels() != 1
            || format.bytes_per_sample() != 2
        {
            return Err(RecognitionError::UnsupportedFormat {
                provider: "local",
                detail: format!("expected 16000 Hz mono 16-bit, got {}", format),
            });
        }

        let samples = Self::pcm16_to_f32(audio.data());
        if samples.is_empty() {
            return Err(RecognitionError::EmptyResult);
        }
        let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;

        let ctx = Arc::clone(&self.ctx);
        let language = self.model_language();
        let threads = self.threads;

        // Inference is CPU-bound and can take seconds; keep it off the
        // async workers.
        let text = tokio::task::spawn_blocking(move || -> Result<String, RecognitionError> {
            let mut state = ctx
                .create_state()
                .map_err(|e| RecognitionError::TransportFailure(e.to_string()))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if language == "auto" {
                params.set_language(None);
            } else {
                params.set_language(Some(&language));
            }
            params.set_n_threads(threads);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            params.set_suppress_blank(true);
            if duration_secs < 30.0 {
                params.set_single_segment(true);
            }

            state
                .full(params, &samples)
                .map_err(|e| RecognitionError::TransportFailure(e.to_string()))?;

            let mut text = String::new();
            for segment in state.as_iter() {
                text.push_str(
                    segment
                        .to_str()
                        .map_err(|e| RecognitionError::ParseError(e.to_string()))?,
                );
            }
            Ok(text)
        })
        .await
        .map_err(|e| RecognitionError::TransportFailure(format!("inference task: {}", e)))??;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RecognitionError::EmptyResult);
        }

        Ok(RecognitionOutcome::from_text(trimmed))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_path_fails_at_construction() {
        let err = WhisperRecognizer::new(&LocalConfig::default(), "en-US").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPath(_)));
    }

    #[test]
    fn nonexistent_model_path_fails_at_construction() {
        let config = LocalConfig {
            model_path: Some("/definitely/not/here/ggml-base.bin".to_string()),
        };
        let err = WhisperRecognizer::new(&config, "en-US").unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidPath(ref path) if path.contains("ggml-base.bin")
        ));
    }

    #[test]
    fn blank_model_path_fails_at_construction() {
        let config = LocalConfig {
            model_path: Some("  ".to_string()),
        };
        assert!(WhisperRecognizer::new(&config, "en-US").is_err());
    }

    #[test]
    fn pcm16_conversion_is_normalized() {
        let bytes: Vec<u8> = [0i16, i16::MAX, i16::MIN]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let samples = WhisperRecognizer::pcm16_to_f32(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (i16::MAX as f32 / 32768.0)).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
    }
}
