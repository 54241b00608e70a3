//! Capture session use case
//!
//! A [`CaptureSession`] is the unit of one recording attempt: it owns a
//! fresh [`AudioBuffer`] and the input device handle for its whole life,
//! runs on its own task, and is discarded after use. Sessions are never
//! reused; constructing a new buffer per session is what guarantees that
//! no stale frames from an earlier recording can leak into a later one.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::ports::{
    AudioSource, CaptureError, DeviceSelector, SourceFrame, SourceStream,
};
use crate::domain::audio::{rms_level, AudioBuffer, AudioFormat, AudioSnapshot};

/// Default cadence for volume level updates
pub const DEFAULT_LEVEL_INTERVAL: Duration = Duration::from_millis(100);

/// Window of audio the level meter looks at, in seconds
const LEVEL_WINDOW_SECS: f64 = 0.1;

/// Parameters for one capture session
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub device: DeviceSelector,
    pub format: AudioFormat,
    pub max_duration: Duration,
    pub level_interval: Duration,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            device: DeviceSelector::Default,
            format: AudioFormat::speech_16k(),
            max_duration: Duration::from_secs(60),
            level_interval: DEFAULT_LEVEL_INTERVAL,
        }
    }
}

/// Capture session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
    Failed,
}

/// Updates a session delivers to its owner.
///
/// `Level` is advisory telemetry for UI metering. `MaxDurationReached`
/// precedes the regular `Stopped` update and is a notification, not an
/// error. A discarded session emits nothing.
#[derive(Debug)]
pub enum CaptureUpdate {
    /// Normalized volume level (0.0 - 1.0) of the most recent audio
    Level(f32),
    /// The session stopped itself because the maximum duration elapsed
    MaxDurationReached,
    /// The session stopped; the snapshot holds exactly this session's audio
    Stopped(AudioSnapshot),
    /// The device failed mid-capture. The partial snapshot is preserved
    /// for inspection but must not be fed to recognition.
    Failed {
        error: CaptureError,
        partial: AudioSnapshot,
    },
}

#[derive(Debug, Clone, Copy)]
enum StopMode {
    Finalize,
    Discard,
}

/// One recording attempt bound to one buffer and one device acquisition.
///
/// Created via [`CaptureSession::start`], which acquires the device before
/// returning so `DeviceNotFound` / `DeviceBusy` surface to the caller
/// synchronously. The session then records until [`stop`](Self::stop) is
/// called or its max duration elapses.
pub struct CaptureSession {
    stop_tx: Option<oneshot::Sender<StopMode>>,
    state_rx: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl CaptureSession {
    /// Acquire the input device and begin recording.
    pub async fn start(
        source: &dyn AudioSource,
        request: CaptureRequest,
        updates: mpsc::Sender<CaptureUpdate>,
    ) -> Result<Self, CaptureError> {
        let (frame_tx, frame_rx) = mpsc::channel(256);
        let stream = source.open(&request.device, request.format, frame_tx).await?;

        tracing::debug!(device = %request.device, format = %request.format, "capture session started");

        // A fresh buffer for every session, never a recycled one.
        let buffer = AudioBuffer::new(request.format);
        let (stop_tx, stop_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Recording);

        let worker = SessionWorker {
            buffer,
            stream: Some(stream),
            frames: frame_rx,
            updates,
            state_tx,
        };
        let task = tokio::spawn(worker.run(request.max_duration, request.level_interval, stop_rx));

        Ok(Self {
            stop_tx: Some(stop_tx),
            state_rx,
            task,
        })
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Whether the session is still recording
    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// Stop recording and finalize the buffer.
    ///
    /// Idempotent: stopping a session that is no longer recording is a
    /// logged no-op, not an error. The sealed snapshot arrives as
    /// [`CaptureUpdate::Stopped`] on the update channel.
    pub fn stop(&mut self) {
        match self.stop_tx.take() {
            Some(tx) => {
                // A closed receiver means the session already stopped itself.
                if tx.send(StopMode::Finalize).is_err() {
                    tracing::debug!("stop requested but session already finished");
                }
            }
            None => tracing::debug!("stop requested on a session that is not recording; ignoring"),
        }
    }

    /// Tear the session down without emitting a snapshot.
    pub fn discard(&mut self) {
        match self.stop_tx.take() {
            Some(tx) => {
                let _ = tx.send(StopMode::Discard);
            }
            None => tracing::debug!("discard requested on a session that is not recording"),
        }
    }

    /// Wait for the session task to finish (used by tests and teardown)
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// The session's dedicated task: pulls frames from the device, appends
/// them to the buffer, meters volume, and enforces the max duration.
struct SessionWorker {
    buffer: AudioBuffer,
    stream: Option<Box<dyn SourceStream>>,
    frames: mpsc::Receiver<SourceFrame>,
    updates: mpsc::Sender<CaptureUpdate>,
    state_tx: watch::Sender<SessionState>,
}

enum SessionOutcome {
    Stopped,
    Discarded,
    Failed(String),
}

impl SessionWorker {
    async fn run(
        mut self,
        max_duration: Duration,
        level_interval: Duration,
        mut stop_rx: oneshot::Receiver<StopMode>,
    ) {
        let deadline = tokio::time::sleep(max_duration);
        tokio::pin!(deadline);

        let mut meter = tokio::time::interval(level_interval);
        meter.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                maybe_frame = self.frames.recv() => match maybe_frame {
                    Some(SourceFrame::Chunk(chunk)) => {
                        if let Err(e) = self.buffer.append(&chunk) {
                            tracing::warn!(error = %e, "dropping malformed audio chunk");
                        }
                    }
                    Some(SourceFrame::Failed(message)) => break SessionOutcome::Failed(message),
                    None => break SessionOutcome::Failed("input stream closed unexpectedly".to_string()),
                },
                _ = meter.tick() => {
                    let tail = self.buffer.recent(LEVEL_WINDOW_SECS);
                    let level = rms_level(&tail, self.buffer.format());
                    let _ = self.updates.send(CaptureUpdate::Level(level)).await;
                }
                _ = &mut deadline => {
                    tracing::info!(
                        elapsed_secs = max_duration.as_secs(),
                        "max recording duration reached; stopping session"
                    );
                    let _ = self.updates.send(CaptureUpdate::MaxDurationReached).await;
                    break SessionOutcome::Stopped;
                }
                mode = &mut stop_rx => break match mode {
                    Ok(StopMode::Finalize) => SessionOutcome::Stopped,
                    Ok(StopMode::Discard) | Err(_) => SessionOutcome::Discarded,
                },
            }
        };

        // Release the device before reporting anything: capture and
        // recognition for one buffer must never overlap, and the next
        // session may only acquire the device once this one let go.
        self.stream.take();

        if matches!(outcome, SessionOutcome::Stopped) {
            self.drain_tail().await;
        }
        self.buffer.seal();

        match outcome {
            SessionOutcome::Stopped => {
                let _ = self.state_tx.send(SessionState::Stopped);
                if let Ok(snapshot) = self.buffer.snapshot() {
                    tracing::debug!(
                        bytes = snapshot.len(),
                        secs = snapshot.duration_secs(),
                        "capture session stopped"
                    );
                    let _ = self.updates.send(CaptureUpdate::Stopped(snapshot)).await;
                }
            }
            SessionOutcome::Failed(message) => {
                let _ = self.state_tx.send(SessionState::Failed);
                let partial = self
                    .buffer
                    .snapshot()
                    .unwrap_or_else(|_| AudioSnapshot::from_bytes(Vec::new(), self.buffer.format()));
                tracing::warn!(error = %message, buffered = partial.len(), "capture device failed");
                let _ = self
                    .updates
                    .send(CaptureUpdate::Failed {
                        error: CaptureError::DeviceFailure(message),
                        partial,
                    })
                    .await;
            }
            SessionOutcome::Discarded => {
                let _ = self.state_tx.send(SessionState::Stopped);
                tracing::debug!("capture session discarded");
            }
        }
    }

    /// Collect frames the device delivered before the stream closed, so a
    /// stop does not cut off the very tail of the recording.
    async fn drain_tail(&mut self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(frame) = self.frames.try_recv() {
            if let SourceFrame::Chunk(chunk) = frame {
                if let Err(e) = self.buffer.append(&chunk) {
                    tracing::warn!(error = %e, "dropping malformed audio chunk");
                }
            }
        }
    }
}
