//! Audio input port interface

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::audio::AudioFormat;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Input device busy or could not be acquired: {0}")]
    DeviceBusy(String),

    #[error("Input device failed: {0}")]
    DeviceFailure(String),
}

/// Which input device to open
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// The host's default input device
    #[default]
    Default,
    /// A device matched by name
    Named(String),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// One delivery from an open input stream
#[derive(Debug)]
pub enum SourceFrame {
    /// A chunk of PCM bytes in the requested format
    Chunk(Vec<u8>),
    /// The device failed mid-capture; no further chunks will arrive
    Failed(String),
}

/// Handle to an open input stream.
/// Dropping the handle releases the device; the next session may only
/// acquire it after that.
pub trait SourceStream: Send {}

/// Port for raw audio input.
///
/// Implementations deliver PCM chunks in the requested format to the
/// provided channel until the returned stream handle is dropped.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Open an input device and start delivering frames.
    ///
    /// # Errors
    /// `DeviceNotFound` if no matching input device exists,
    /// `DeviceBusy` if the device cannot be acquired.
    async fn open(
        &self,
        device: &DeviceSelector,
        format: AudioFormat,
        frames: mpsc::Sender<SourceFrame>,
    ) -> Result<Box<dyn SourceStream>, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_selector_display() {
        assert_eq!(DeviceSelector::Default.to_string(), "default");
        assert_eq!(
            DeviceSelector::Named("USB Microphone".into()).to_string(),
            "USB Microphone"
        );
    }

    #[test]
    fn capture_error_messages() {
        let err = CaptureError::DeviceNotFound("mic2".into());
        assert!(err.to_string().contains("mic2"));

        let err = CaptureError::DeviceFailure("stream died".into());
        assert!(err.to_string().contains("stream died"));
    }
}
