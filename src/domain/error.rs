//! Domain error types

use thiserror::Error;

/// Error when a recognition provider is misconfigured.
/// Raised at provider construction/selection time, never mid-call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing credential for provider '{0}'")]
    MissingCredential(&'static str),

    #[error("Invalid model path: {0}")]
    InvalidPath(String),

    #[error("Unknown provider type: \"{0}\". Valid providers are: google, yandex, local")]
    UnknownProviderType(String),
}

/// Error when loading or saving the settings file fails
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(String),

    #[error("Failed to parse settings file: {0}")]
    ParseError(String),

    #[error("Failed to write settings file: {0}")]
    WriteError(String),
}
