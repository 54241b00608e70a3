//! Application layer - Use cases and port interfaces
//!
//! Contains the core pipeline operations and trait definitions
//! for external system interactions.

pub mod annotation;
pub mod capture;
pub mod ports;
pub mod recognition;

// Re-export use cases
pub use annotation::{
    AnnotationError, AnnotationEvent, AnnotationHandle, AnnotationStateMachine,
};
pub use capture::{CaptureRequest, CaptureSession, CaptureUpdate, SessionState};
pub use recognition::{RecognitionTask, RecognitionUpdate};
