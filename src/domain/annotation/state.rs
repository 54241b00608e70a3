//! Annotation lifecycle state machine

use std::fmt;
use thiserror::Error;

/// Annotation pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnnotationState {
    #[default]
    Idle,
    Recording,
    Stopping,
    Recognizing,
    Ready,
    Error,
}

impl AnnotationState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Recognizing => "recognizing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AnnotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted.
/// Used defensively; re-entrant start/stop are swallowed by policy in the
/// orchestrator and never reach this error.
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current} state")]
pub struct InvalidTransition {
    pub current: AnnotationState,
    pub action: &'static str,
}

/// Annotation lifecycle entity.
/// Holds the pure transition rules for one annotation attempt.
///
/// State machine:
///   IDLE -> RECORDING (begin_recording)
///   RECORDING -> STOPPING (begin_stopping: user stop or max duration)
///   STOPPING -> RECOGNIZING (begin_recognizing)
///   READY | ERROR -> RECOGNIZING (begin_recognizing: manual trigger/retry)
///   STOPPING | RECOGNIZING -> READY (settle_ready)
///   RECORDING | STOPPING | RECOGNIZING -> ERROR (fail)
///   any -> IDLE (reset: cancel or finalize)
#[derive(Debug, Default)]
pub struct AnnotationLifecycle {
    state: AnnotationState,
}

impl AnnotationLifecycle {
    /// Create a new lifecycle in idle state
    pub fn new() -> Self {
        Self {
            state: AnnotationState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> AnnotationState {
        self.state
    }

    /// Check if currently idle
    pub fn is_idle(&self) -> bool {
        self.state == AnnotationState::Idle
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        self.state == AnnotationState::Recording
    }

    /// Check if a recognition task may produce results right now
    pub fn is_recognizing(&self) -> bool {
        self.state == AnnotationState::Recognizing
    }

    /// Transition from IDLE to RECORDING
    pub fn begin_recording(&mut self) -> Result<(), InvalidTransition> {
        if self.state != AnnotationState::Idle {
            return Err(InvalidTransition {
                current: self.state,
                action: "start recording",
            });
        }
        self.state = AnnotationState::Recording;
        Ok(())
    }

    /// Transition from RECORDING to STOPPING
    pub fn begin_stopping(&mut self) -> Result<(), InvalidTransition> {
        if self.state != AnnotationState::Recording {
            return Err(InvalidTransition {
                current: self.state,
                action: "stop recording",
            });
        }
        self.state = AnnotationState::Stopping;
        Ok(())
    }

    /// Transition to RECOGNIZING, either from STOPPING (auto recognition)
    /// or from READY/ERROR (manual trigger or retry)
    pub fn begin_recognizing(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            AnnotationState::Stopping | AnnotationState::Ready | AnnotationState::Error => {
                self.state = AnnotationState::Recognizing;
                Ok(())
            }
            current => Err(InvalidTransition {
                current,
                action: "begin recognition",
            }),
        }
    }

    /// Transition from STOPPING or RECOGNIZING to READY
    pub fn settle_ready(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            AnnotationState::Stopping | AnnotationState::Recognizing => {
                self.state = AnnotationState::Ready;
                Ok(())
            }
            current => Err(InvalidTransition {
                current,
                action: "settle into ready",
            }),
        }
    }

    /// Transition from RECORDING, STOPPING or RECOGNIZING to ERROR
    pub fn fail(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            AnnotationState::Recording
            | AnnotationState::Stopping
            | AnnotationState::Recognizing => {
                self.state = AnnotationState::Error;
                Ok(())
            }
            current => Err(InvalidTransition {
                current,
                action: "fail",
            }),
        }
    }

    /// Return to IDLE from any state (cancel or finalize)
    pub fn reset(&mut self) {
        self.state = AnnotationState::Idle;
    }
}
