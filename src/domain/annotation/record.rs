//! Annotation record entity

/// One user-visible annotation attempt.
///
/// Holds the recognized (and user-editable) text, the last error message
/// and the activity flags the shell renders. The `already_submitted` latch
/// guarantees a record is emitted at most once.
///
/// Setters return `true` when the value actually changed, so the
/// orchestrator only publishes events for real changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRecord {
    text: String,
    error: Option<String>,
    is_recording: bool,
    is_recognizing: bool,
    already_submitted: bool,
}

impl AnnotationRecord {
    /// Create a record with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Current annotation text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Last error message, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a capture session is active
    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Whether a recognition task is in flight
    pub fn is_recognizing(&self) -> bool {
        self.is_recognizing
    }

    /// Whether this record has already been emitted
    pub fn already_submitted(&self) -> bool {
        self.already_submitted
    }

    /// Set the text; returns `true` if it changed
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text == text {
            return false;
        }
        self.text = text;
        true
    }

    /// Set or clear the error message; returns `true` if it changed
    pub fn set_error(&mut self, error: Option<String>) -> bool {
        if self.error == error {
            return false;
        }
        self.error = error;
        true
    }

    /// Set the recording flag; returns `true` if it changed
    pub fn set_recording(&mut self, value: bool) -> bool {
        if self.is_recording == value {
            return false;
        }
        self.is_recording = value;
        true
    }

    /// Set the recognizing flag; returns `true` if it changed
    pub fn set_recognizing(&mut self, value: bool) -> bool {
        if self.is_recognizing == value {
            return false;
        }
        self.is_recognizing = value;
        true
    }

    /// One-shot submission latch.
    ///
    /// Returns `true` on the first call and `false` on every subsequent
    /// call until [`reset`](AnnotationRecord::reset).
    pub fn mark_submitted(&mut self) -> bool {
        if self.already_submitted {
            return false;
        }
        self.already_submitted = true;
        true
    }

    /// Reset all fields to their defaults (surface closed or new attempt)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
