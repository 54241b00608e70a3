//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod recognizer;
pub mod settings_store;
pub mod source;

// Re-export common types
pub use recognizer::{
    Alternative, RecognitionError, RecognitionOutcome, Recognizer, RecognizerFactory,
};
pub use settings_store::SettingsStore;
pub use source::{AudioSource, CaptureError, DeviceSelector, SourceFrame, SourceStream};
