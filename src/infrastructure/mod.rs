//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with cpal, the cloud speech APIs, whisper.cpp and the
//! settings file.

pub mod audio;
pub mod config;
pub mod recognition;

// Re-export adapters
pub use audio::{list_input_devices, CpalAudioSource};
pub use config::XdgSettingsStore;
pub use recognition::{GoogleRecognizer, ProviderFactory, WhisperRecognizer, YandexRecognizer};
