//! Recognition provider factory

use std::sync::Arc;

use crate::application::ports::{Recognizer, RecognizerFactory};
use crate::domain::config::{ProviderKind, VoiceSettings};
use crate::domain::error::ConfigurationError;

use super::google::GoogleRecognizer;
use super::whisper::WhisperRecognizer;
use super::yandex::YandexRecognizer;

/// Builds recognizers from settings.
///
/// Selection happens via the `provider` selector; an unknown selector and
/// any missing credential or model path fail here, before a recording is
/// allowed to start.
#[derive(Debug, Default)]
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a new provider factory
    pub fn new() -> Self {
        Self
    }
}

impl RecognizerFactory for ProviderFactory {
    fn create(&self, settings: &VoiceSettings) -> Result<Arc<dyn Recognizer>, ConfigurationError> {
        let kind: ProviderKind = settings.provider_or_default().parse()?;
        let language = settings.language_or_default();
        let sample_rate = settings.sample_rate_or_default();

        tracing::info!(provider = %kind, language, sample_rate, "creating recognizer");

        match kind {
            ProviderKind::Google => {
                let config = settings.google.clone().unwrap_or_default();
                Ok(Arc::new(GoogleRecognizer::new(&config, language, sample_rate)?))
            }
            ProviderKind::Yandex => {
                let config = settings.yandex.clone().unwrap_or_default();
                Ok(Arc::new(YandexRecognizer::new(&config, language, sample_rate)?))
            }
            ProviderKind::Local => {
                let config = settings.local.clone().unwrap_or_default();
                Ok(Arc::new(WhisperRecognizer::new(&config, language)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{GoogleConfig, YandexConfig};

    #[test]
    fn unknown_provider_fails_at_selection_time() {
        let settings = VoiceSettings {
            provider: Some("dragon".to_string()),
            ..VoiceSettings::defaults()
        };
        let err = ProviderFactory::new().create(&settings).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownProviderType("dragon".to_string())
        );
    }

    #[test]
    fn google_without_credential_fails() {
        let settings = VoiceSettings {
            provider: Some("google".to_string()),
            ..VoiceSettings::defaults()
        };
        let err = ProviderFactory::new().create(&settings).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingCredential("google"));
    }

    #[test]
    fn yandex_without_credential_fails() {
        let settings = VoiceSettings {
            provider: Some("yandex".to_string()),
            ..VoiceSettings::defaults()
        };
        let err = ProviderFactory::new().create(&settings).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingCredential("yandex"));
    }

    #[test]
    fn local_without_model_path_fails() {
        let settings = VoiceSettings {
            provider: Some("local".to_string()),
            ..VoiceSettings::defaults()
        };
        let err = ProviderFactory::new().create(&settings).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPath(_)));
    }

    #[test]
    fn google_with_credential_builds() {
        let settings = VoiceSettings {
            provider: Some("google".to_string()),
            google: Some(GoogleConfig {
                api_key: Some("key".to_string()),
                model: None,
            }),
            ..VoiceSettings::defaults()
        };
        let recognizer = ProviderFactory::new().create(&settings).unwrap();
        assert_eq!(recognizer.name(), "google");
    }

    #[test]
    fn yandex_with_credential_builds() {
        let settings = VoiceSettings {
            provider: Some("yandex".to_string()),
            yandex: Some(YandexConfig {
                api_key: Some("key".to_string()),
                topic: None,
            }),
            ..VoiceSettings::defaults()
        };
        let recognizer = ProviderFactory::new().create(&settings).unwrap();
        assert_eq!(recognizer.name(), "yandex");
    }
}
