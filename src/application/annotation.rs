//! Annotation state machine use case
//!
//! The orchestrator of the whole pipeline. It owns the current capture
//! session and recognition task, enforces the annotation lifecycle and
//! serializes every state mutation through one command/update loop, so
//! no two transitions can race. The UI shell talks to it exclusively
//! through an [`AnnotationHandle`] and the broadcast event surface.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::application::capture::{
    CaptureRequest, CaptureSession, CaptureUpdate, DEFAULT_LEVEL_INTERVAL,
};
use crate::application::ports::{
    AudioSource, CaptureError, DeviceSelector, RecognitionError, Recognizer, RecognizerFactory,
};
use crate::application::recognition::{RecognitionTask, RecognitionUpdate, DEFAULT_CANCEL_GRACE};
use crate::domain::annotation::{AnnotationLifecycle, AnnotationRecord, AnnotationState};
use crate::domain::audio::{AudioFormat, AudioSnapshot};
use crate::domain::config::VoiceSettings;
use crate::domain::error::ConfigurationError;

/// Capacity of the broadcast event channel the shell subscribes to
const EVENT_CAPACITY: usize = 64;

/// Events published to the shell.
///
/// This is the whole outward surface: the shell renders these and calls
/// the handle; it never reaches into the pipeline's internals.
#[derive(Debug, Clone)]
pub enum AnnotationEvent {
    /// Live volume level for metering (0.0 - 1.0)
    LevelChanged(f32),
    /// Recording activity toggled
    RecordingChanged(bool),
    /// Recognition activity toggled
    RecognizingChanged(bool),
    /// The annotation text changed (recognition result or user edit)
    TextChanged(String),
    /// The error message changed; empty string means cleared
    ErrorChanged(String),
    /// The lifecycle moved to a new state
    StateChanged(AnnotationState),
    /// The finalized record, emitted exactly once per attempt
    Submitted(AnnotationRecord),
}

/// Errors from the annotation pipeline
#[derive(Debug, Clone, Error)]
pub enum AnnotationError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Nothing was captured")]
    EmptyCapture,

    #[error("Annotation pipeline is shut down")]
    Closed,
}

enum Command {
    StartRecording,
    StopRecording,
    Finalize,
    Cancel,
    Recognize,
    SetText(String),
    SetProvider {
        settings: VoiceSettings,
        reply: oneshot::Sender<Result<(), ConfigurationError>>,
    },
    GetState {
        reply: oneshot::Sender<AnnotationState>,
    },
    LastCapture {
        reply: oneshot::Sender<Option<AudioSnapshot>>,
    },
    Shutdown,
}

/// Cloneable handle the shell uses to drive the pipeline
#[derive(Clone)]
pub struct AnnotationHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<AnnotationEvent>,
}

impl AnnotationHandle {
    /// Subscribe to the pipeline's event surface
    pub fn subscribe(&self) -> broadcast::Receiver<AnnotationEvent> {
        self.events.subscribe()
    }

    /// Begin a new recording attempt. Re-entrant calls while a recording
    /// is active are swallowed (logged, not an error).
    pub async fn start_recording(&self) -> Result<(), AnnotationError> {
        self.send(Command::StartRecording).await
    }

    /// Stop the active recording. Idempotent.
    pub async fn stop_recording(&self) -> Result<(), AnnotationError> {
        self.send(Command::StopRecording).await
    }

    /// Emit the finished annotation record (at most once) and return to idle
    pub async fn finalize(&self) -> Result<(), AnnotationError> {
        self.send(Command::Finalize).await
    }

    /// Abort the current attempt: discard session and task, emit nothing
    pub async fn cancel(&self) -> Result<(), AnnotationError> {
        self.send(Command::Cancel).await
    }

    /// Manually trigger recognition of the retained capture (used when
    /// auto-recognition is off, or as the single manual retry after an
    /// error)
    pub async fn recognize(&self) -> Result<(), AnnotationError> {
        self.send(Command::Recognize).await
    }

    /// Replace the annotation text (user edit; ready state only)
    pub async fn set_text(&self, text: impl Into<String>) -> Result<(), AnnotationError> {
        self.send(Command::SetText(text.into())).await
    }

    /// Reload the recognition provider from new settings.
    ///
    /// Fails fast with a [`ConfigurationError`] before any recording is
    /// allowed to start; on failure the previous provider stays active.
    pub async fn set_provider(&self, settings: VoiceSettings) -> Result<(), AnnotationError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SetProvider { settings, reply })
            .await
            .map_err(|_| AnnotationError::Closed)?;
        rx.await
            .map_err(|_| AnnotationError::Closed)?
            .map_err(AnnotationError::from)
    }

    /// Current lifecycle state
    pub async fn state(&self) -> Result<AnnotationState, AnnotationError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::GetState { reply })
            .await
            .map_err(|_| AnnotationError::Closed)?;
        rx.await.map_err(|_| AnnotationError::Closed)
    }

    /// The retained snapshot of the last capture, if any (WAV export,
    /// inspection after a device failure)
    pub async fn last_capture(&self) -> Result<Option<AudioSnapshot>, AnnotationError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::LastCapture { reply })
            .await
            .map_err(|_| AnnotationError::Closed)?;
        rx.await.map_err(|_| AnnotationError::Closed)
    }

    /// Tear the pipeline down
    pub async fn shutdown(&self) -> Result<(), AnnotationError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), AnnotationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AnnotationError::Closed)
    }
}

/// The orchestrator actor.
///
/// Spawned once per annotation surface; owns at most one capture session
/// and one recognition task at a time and discards both on every exit
/// path.
pub struct AnnotationStateMachine {
    source: Arc<dyn AudioSource>,
    factory: Arc<dyn RecognizerFactory>,
    recognizer: Arc<dyn Recognizer>,
    settings: VoiceSettings,

    lifecycle: AnnotationLifecycle,
    record: AnnotationRecord,
    session: Option<CaptureSession>,
    recognition: Option<RecognitionTask>,
    /// Snapshot retained for manual re-recognition or export
    snapshot: Option<AudioSnapshot>,
    /// False when the retained snapshot came from a failed session
    snapshot_recognizable: bool,
    /// Monotonic counter; results tagged with an older value are stale
    generation: u64,

    commands: mpsc::Receiver<Command>,
    capture_tx: mpsc::Sender<CaptureUpdate>,
    capture_rx: mpsc::Receiver<CaptureUpdate>,
    recognition_tx: mpsc::Sender<RecognitionUpdate>,
    recognition_rx: mpsc::Receiver<RecognitionUpdate>,
    events: broadcast::Sender<AnnotationEvent>,
}

impl AnnotationStateMachine {
    /// Validate the configured provider, spawn the actor, and return the
    /// shell-facing handle.
    pub fn spawn(
        source: Arc<dyn AudioSource>,
        factory: Arc<dyn RecognizerFactory>,
        settings: VoiceSettings,
    ) -> Result<AnnotationHandle, ConfigurationError> {
        let settings = VoiceSettings::defaults().merge(settings);
        // Configuration problems surface here, before any recording.
        let recognizer = factory.create(&settings)?;
        tracing::info!(provider = recognizer.name(), "annotation pipeline starting");

        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (capture_tx, capture_rx) = mpsc::channel(64);
        let (recognition_tx, recognition_rx) = mpsc::channel(8);

        let machine = Self {
            source,
            factory,
            recognizer,
            settings,
            lifecycle: AnnotationLifecycle::new(),
            record: AnnotationRecord::new(),
            session: None,
            recognition: None,
            snapshot: None,
            snapshot_recognizable: false,
            generation: 0,
            commands: command_rx,
            capture_tx,
            capture_rx,
            recognition_tx,
            recognition_rx,
            events: event_tx.clone(),
        };
        tokio::spawn(machine.run());

        Ok(AnnotationHandle {
            commands: command_tx,
            events: event_tx,
        })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_command = self.commands.recv() => match maybe_command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(update) = self.capture_rx.recv() => self.on_capture_update(update),
                Some(update) = self.recognition_rx.recv() => self.on_recognition_update(update),
            }
        }
        self.abort_work();
        tracing::debug!("annotation pipeline stopped");
    }

    /// Returns `true` when the actor should shut down
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::StartRecording => self.start_recording().await,
            Command::StopRecording => self.stop_recording(),
            Command::Finalize => self.finalize(),
            Command::Cancel => self.cancel(),
            Command::Recognize => self.recognize(),
            Command::SetText(text) => self.user_edit(text),
            Command::SetProvider { settings, reply } => {
                let _ = reply.send(self.set_provider(settings));
            }
            Command::GetState { reply } => {
                let _ = reply.send(self.lifecycle.state());
            }
            Command::LastCapture { reply } => {
                let _ = reply.send(self.snapshot.clone());
            }
            Command::Shutdown => return true,
        }
        false
    }

    async fn start_recording(&mut self) {
        if !self.lifecycle.is_idle() {
            // Re-entrant start attempts are intentionally swallowed.
            tracing::info!(state = %self.lifecycle.state(), "start_recording ignored: not idle");
            return;
        }

        // A new attempt: fresh record, no retained capture, and any result
        // still in flight from a previous attempt becomes stale.
        self.generation += 1;
        self.snapshot = None;
        self.snapshot_recognizable = false;
        self.reset_record();

        let request = self.capture_request();
        match CaptureSession::start(self.source.as_ref(), request, self.capture_tx.clone()).await {
            Ok(session) => {
                self.session = Some(session);
                if self.lifecycle.begin_recording().is_ok() {
                    self.publish_state();
                }
                self.set_recording_flag(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start capture session");
                // Stays idle; the shell may retry right away.
                self.set_error_message(Some(e.to_string()));
            }
        }
    }

    fn stop_recording(&mut self) {
        if !self.lifecycle.is_recording() {
            tracing::info!(state = %self.lifecycle.state(), "stop_recording ignored: not recording");
            return;
        }
        if self.lifecycle.begin_stopping().is_ok() {
            self.publish_state();
        }
        if let Some(session) = self.session.as_mut() {
            session.stop();
        }
    }

    fn finalize(&mut self) {
        if self.lifecycle.state() != AnnotationState::Ready {
            tracing::info!(state = %self.lifecycle.state(), "finalize ignored: not ready");
            return;
        }
        if !self.record.mark_submitted() {
            tracing::warn!("annotation already submitted; ignoring finalize");
            return;
        }

        self.publish(AnnotationEvent::Submitted(self.record.clone()));
        self.snapshot = None;
        self.snapshot_recognizable = false;
        self.lifecycle.reset();
        self.publish_state();
        self.reset_record();
    }

    fn cancel(&mut self) {
        if self.lifecycle.is_idle() {
            tracing::debug!("cancel ignored: already idle");
            return;
        }

        self.abort_work();
        self.snapshot = None;
        self.snapshot_recognizable = false;
        self.lifecycle.reset();
        self.publish_state();
        self.reset_record();
    }

    fn recognize(&mut self) {
        if self
            .recognition
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            tracing::warn!("recognition already in progress; rejecting");
            self.set_error_message(Some(RecognitionError::AlreadyInProgress.to_string()));
            return;
        }
        if !matches!(
            self.lifecycle.state(),
            AnnotationState::Ready | AnnotationState::Error
        ) {
            tracing::info!(state = %self.lifecycle.state(), "recognize ignored");
            return;
        }
        let Some(snapshot) = self.snapshot.clone() else {
            tracing::info!("recognize ignored: no capture retained");
            return;
        };
        if !self.snapshot_recognizable {
            tracing::info!("recognize ignored: last capture failed and is not recognizable");
            return;
        }

        // A retry clears the previous error before running.
        self.set_error_message(None);
        self.submit_recognition(snapshot);
    }

    fn user_edit(&mut self, text: String) {
        if self.lifecycle.state() != AnnotationState::Ready {
            tracing::debug!(state = %self.lifecycle.state(), "set_text ignored outside ready state");
            return;
        }
        self.set_text_value(text);
    }

    fn set_provider(&mut self, settings: VoiceSettings) -> Result<(), ConfigurationError> {
        let merged = VoiceSettings::defaults().merge(settings);
        match self.factory.create(&merged) {
            Ok(recognizer) => {
                tracing::info!(provider = recognizer.name(), "recognition provider loaded");
                self.recognizer = recognizer;
                self.settings = merged;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "provider configuration rejected; keeping previous provider");
                self.set_error_message(Some(e.to_string()));
                Err(e)
            }
        }
    }

    fn on_capture_update(&mut self, update: CaptureUpdate) {
        match update {
            CaptureUpdate::Level(level) => {
                if matches!(
                    self.lifecycle.state(),
                    AnnotationState::Recording | AnnotationState::Stopping
                ) {
                    self.publish(AnnotationEvent::LevelChanged(level));
                }
            }
            CaptureUpdate::MaxDurationReached => {
                if self.lifecycle.is_recording() {
                    tracing::info!("recording reached the maximum duration");
                    if self.lifecycle.begin_stopping().is_ok() {
                        self.publish_state();
                    }
                }
            }
            CaptureUpdate::Stopped(snapshot) => self.on_capture_stopped(snapshot),
            CaptureUpdate::Failed { error, partial } => self.on_capture_failed(error, partial),
        }
    }

    fn on_capture_stopped(&mut self, snapshot: AudioSnapshot) {
        if self.lifecycle.state() != AnnotationState::Stopping {
            // A snapshot racing a cancel: the attempt is gone, drop it.
            tracing::debug!(state = %self.lifecycle.state(), "ignoring snapshot from a stale session");
            return;
        }

        // The session task released the device before sending this.
        self.session = None;
        self.set_recording_flag(false);

        if snapshot.is_empty() {
            tracing::warn!("capture produced no audio");
            self.fail_with(AnnotationError::EmptyCapture.to_string());
            return;
        }

        self.snapshot = Some(snapshot.clone());
        self.snapshot_recognizable = true;

        if self.settings.auto_recognition_or_default() {
            self.submit_recognition(snapshot);
        } else {
            // Ready with empty text, awaiting the manual trigger.
            if self.lifecycle.settle_ready().is_ok() {
                self.publish_state();
            }
        }
    }

    fn on_capture_failed(&mut self, error: CaptureError, partial: AudioSnapshot) {
        if !matches!(
            self.lifecycle.state(),
            AnnotationState::Recording | AnnotationState::Stopping
        ) {
            tracing::debug!("ignoring failure from a stale session");
            return;
        }

        self.session = None;
        self.set_recording_flag(false);

        // Preserved for inspection, never offered to recognition.
        if !partial.is_empty() {
            self.snapshot = Some(partial);
        }
        self.snapshot_recognizable = false;
        self.fail_with(error.to_string());
    }

    fn on_recognition_update(&mut self, update: RecognitionUpdate) {
        if update.generation() != self.generation || !self.lifecycle.is_recognizing() {
            tracing::debug!(
                generation = update.generation(),
                current = self.generation,
                "ignoring stale recognition result"
            );
            return;
        }

        self.recognition = None;
        self.set_recognizing_flag(false);

        match update {
            RecognitionUpdate::Finished { outcome, .. } => {
                self.set_text_value(outcome.text);
                self.set_error_message(None);
                if self.lifecycle.settle_ready().is_ok() {
                    self.publish_state();
                }
            }
            RecognitionUpdate::Failed { error, .. } => {
                // Prior partial text, if any, stays for the user to inspect.
                self.fail_with(error.to_string());
            }
        }
    }

    fn submit_recognition(&mut self, snapshot: AudioSnapshot) {
        self.generation += 1;
        let task = RecognitionTask::submit(
            Arc::clone(&self.recognizer),
            snapshot,
            self.generation,
            self.recognition_tx.clone(),
        );
        self.recognition = Some(task);
        if self.lifecycle.begin_recognizing().is_ok() {
            self.publish_state();
        }
        self.set_recognizing_flag(true);
    }

    fn fail_with(&mut self, message: String) {
        self.set_error_message(Some(message));
        if self.lifecycle.fail().is_ok() {
            self.publish_state();
        }
    }

    fn abort_work(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.discard();
        }
        if let Some(task) = self.recognition.take() {
            task.cancel(DEFAULT_CANCEL_GRACE);
        }
        // Anything still in flight is stale from here on.
        self.generation += 1;
    }

    fn capture_request(&self) -> CaptureRequest {
        let device = match &self.settings.input_device {
            Some(name) => DeviceSelector::Named(name.clone()),
            None => DeviceSelector::Default,
        };
        CaptureRequest {
            device,
            format: AudioFormat::new(self.settings.sample_rate_or_default(), 1, 2),
            max_duration: Duration::from_secs(self.settings.max_duration_or_default()),
            level_interval: DEFAULT_LEVEL_INTERVAL,
        }
    }

    fn publish(&self, event: AnnotationEvent) {
        // No subscribers is fine; the pipeline does not depend on the shell.
        let _ = self.events.send(event);
    }

    fn publish_state(&self) {
        self.publish(AnnotationEvent::StateChanged(self.lifecycle.state()));
    }

    fn set_recording_flag(&mut self, value: bool) {
        if self.record.set_recording(value) {
            self.publish(AnnotationEvent::RecordingChanged(value));
        }
    }

    fn set_recognizing_flag(&mut self, value: bool) {
        if self.record.set_recognizing(value) {
            self.publish(AnnotationEvent::RecognizingChanged(value));
        }
    }

    fn set_text_value(&mut self, text: String) {
        if self.record.set_text(text.clone()) {
            self.publish(AnnotationEvent::TextChanged(text));
        }
    }

    fn set_error_message(&mut self, error: Option<String>) {
        let message = error.clone().unwrap_or_default();
        if self.record.set_error(error) {
            self.publish(AnnotationEvent::ErrorChanged(message));
        }
    }

    fn reset_record(&mut self) {
        self.set_text_value(String::new());
        self.set_error_message(None);
        self.set_recording_flag(false);
        self.set_recognizing_flag(false);
        // Also clears the submission latch for the next attempt.
        self.record.reset();
    }
}
