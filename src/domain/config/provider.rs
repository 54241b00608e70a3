//! Recognition provider selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigurationError;

/// Available recognition providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Cloud Speech-to-Text (REST)
    Google,
    /// Yandex SpeechKit (REST)
    Yandex,
    /// Local whisper.cpp inference
    #[default]
    Local,
}

impl ProviderKind {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Yandex => "yandex",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigurationError;

    /// Parse a provider selector. Unknown selectors fail here, at
    /// selection time, never at recognition time.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "yandex" => Ok(Self::Yandex),
            "local" => Ok(Self::Local),
            _ => Err(ConfigurationError::UnknownProviderType(s.to_string())),
        }
    }
}
