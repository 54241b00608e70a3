//! Voice pipeline settings value object

use serde::{Deserialize, Serialize};

/// Default capture sample rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 16_000;

/// Default maximum recording duration in seconds
pub const DEFAULT_MAX_DURATION_SECS: u64 = 60;

/// Default recognition language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Google Cloud Speech provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Yandex SpeechKit provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YandexConfig {
    pub api_key: Option<String>,
    pub topic: Option<String>,
}

/// Local whisper.cpp provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub model_path: Option<String>,
}

/// Voice pipeline settings.
/// All fields are optional to support partial configs and merging;
/// they are read once per provider (re)load, not polled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub provider: Option<String>,
    pub language: Option<String>,
    pub input_device: Option<String>,
    pub sample_rate_hz: Option<u32>,
    pub max_duration_secs: Option<u64>,
    pub auto_recognition: Option<bool>,
    pub google: Option<GoogleConfig>,
    pub yandex: Option<YandexConfig>,
    pub local: Option<LocalConfig>,
}

impl VoiceSettings {
    /// Create settings with default values
    pub fn defaults() -> Self {
        Self {
            provider: Some("local".to_string()),
            language: Some(DEFAULT_LANGUAGE.to_string()),
            input_device: None,
            sample_rate_hz: Some(DEFAULT_SAMPLE_RATE_HZ),
            max_duration_secs: Some(DEFAULT_MAX_DURATION_SECS),
            auto_recognition: Some(true),
            google: None,
            yandex: None,
            local: None,
        }
    }

    /// Create an empty settings object (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge these settings with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            language: other.language.or(self.language),
            input_device: other.input_device.or(self.input_device),
            sample_rate_hz: other.sample_rate_hz.or(self.sample_rate_hz),
            max_duration_secs: other.max_duration_secs.or(self.max_duration_secs),
            auto_recognition: other.auto_recognition.or(self.auto_recognition),
            google: merge_section(self.google, other.google, |base, over| GoogleConfig {
                api_key: over.api_key.or(base.api_key),
                model: over.model.or(base.model),
            }),
            yandex: merge_section(self.yandex, other.yandex, |base, over| YandexConfig {
                api_key: over.api_key.or(base.api_key),
                topic: over.topic.or(base.topic),
            }),
            local: merge_section(self.local, other.local, |base, over| LocalConfig {
                model_path: over.model_path.or(base.model_path),
            }),
        }
    }

    /// Get the provider selector, or "local" if not set
    pub fn provider_or_default(&self) -> &str {
        self.provider.as_deref().unwrap_or("local")
    }

    /// Get the language, or the default if not set
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Get the sample rate, or 16 kHz if not set
    pub fn sample_rate_or_default(&self) -> u32 {
        self.sample_rate_hz.unwrap_or(DEFAULT_SAMPLE_RATE_HZ)
    }

    /// Get the maximum recording duration, or 60 s if not set
    pub fn max_duration_or_default(&self) -> u64 {
        self.max_duration_secs.unwrap_or(DEFAULT_MAX_DURATION_SECS)
    }

    /// Get the auto-recognition flag, or true if not set
    pub fn auto_recognition_or_default(&self) -> bool {
        self.auto_recognition.unwrap_or(true)
    }
}

/// Merge an optional config section field by field
fn merge_section<T>(
    base: Option<T>,
    other: Option<T>,
    merge: impl FnOnce(T, T) -> T,
) -> Option<T> {
    match (base, other) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(b), Some(o)) => Some(merge(b, o)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_populated() {
        let settings = VoiceSettings::defaults();
        assert_eq!(settings.provider_or_default(), "local");
        assert_eq!(settings.sample_rate_or_default(), 16_000);
        assert_eq!(settings.max_duration_or_default(), 60);
        assert!(settings.auto_recognition_or_default());
    }

    #[test]
    fn empty_falls_back_through_accessors() {
        let settings = VoiceSettings::empty();
        assert_eq!(settings.provider_or_default(), "local");
        assert_eq!(settings.language_or_default(), DEFAULT_LANGUAGE);
        assert!(settings.auto_recognition_or_default());
    }

    #[test]
    fn merge_prefers_other() {
        let base = VoiceSettings::defaults();
        let override_settings = VoiceSettings {
            provider: Some("google".into()),
            max_duration_secs: Some(30),
            ..VoiceSettings::empty()
        };

        let merged = base.merge(override_settings);
        assert_eq!(merged.provider_or_default(), "google");
        assert_eq!(merged.max_duration_or_default(), 30);
        // Untouched fields keep the base values
        assert_eq!(merged.sample_rate_or_default(), 16_000);
    }

    #[test]
    fn merge_sections_field_by_field() {
        let base = VoiceSettings {
            google: Some(GoogleConfig {
                api_key: Some("key".into()),
                model: Some("default".into()),
            }),
            ..VoiceSettings::empty()
        };
        let other = VoiceSettings {
            google: Some(GoogleConfig {
                api_key: None,
                model: Some("phone_call".into()),
            }),
            ..VoiceSettings::empty()
        };

        let merged = base.merge(other);
        let google = merged.google.unwrap();
        assert_eq!(google.api_key.as_deref(), Some("key"));
        assert_eq!(google.model.as_deref(), Some("phone_call"));
    }

    #[test]
    fn merge_keeps_base_section_when_other_missing() {
        let base = VoiceSettings {
            local: Some(LocalConfig {
                model_path: Some("/models/ggml-base.bin".into()),
            }),
            ..VoiceSettings::empty()
        };

        let merged = base.merge(VoiceSettings::empty());
        assert!(merged.local.is_some());
    }

    #[test]
    fn toml_round_trip() {
        let settings = VoiceSettings {
            provider: Some("yandex".into()),
            yandex: Some(YandexConfig {
                api_key: Some("secret".into()),
                topic: Some("general".into()),
            }),
            ..VoiceSettings::defaults()
        };

        let text = toml::to_string(&settings).unwrap();
        let parsed: VoiceSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
