//! Recognition task use case
//!
//! Drives exactly one recognizer call per submission on its own task, so
//! network or model-inference latency never blocks the orchestrator or
//! the capture side. Results come back as values over the owner's update
//! channel, tagged with a generation counter so results from a cancelled
//! task are recognizably stale and can be dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::application::ports::{RecognitionError, RecognitionOutcome, Recognizer};
use crate::domain::audio::AudioSnapshot;

/// How long a cancelled task is given to wind down before it is detached
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Result of a recognition task, delivered on the owner's update channel
#[derive(Debug)]
pub enum RecognitionUpdate {
    Finished {
        generation: u64,
        outcome: RecognitionOutcome,
    },
    Failed {
        generation: u64,
        error: RecognitionError,
    },
}

impl RecognitionUpdate {
    /// The generation the producing task was submitted under
    pub fn generation(&self) -> u64 {
        match self {
            Self::Finished { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// A single in-flight recognition call.
///
/// At most one task may be outstanding per annotation record; enforcing
/// that is the orchestrator's job via [`is_finished`](Self::is_finished).
pub struct RecognitionTask {
    generation: u64,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RecognitionTask {
    /// Spawn a task running one `recognize()` call.
    ///
    /// The outcome (success or failure) is delivered as a
    /// [`RecognitionUpdate`] carrying `generation`.
    pub fn submit(
        recognizer: Arc<dyn Recognizer>,
        audio: AudioSnapshot,
        generation: u64,
        updates: mpsc::Sender<RecognitionUpdate>,
    ) -> Self {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tracing::debug!(
                provider = recognizer.name(),
                bytes = audio.len(),
                generation,
                "recognition task started"
            );

            tokio::select! {
                result = recognizer.recognize(&audio) => {
                    let update = match result {
                        Ok(outcome) => {
                            tracing::debug!(generation, chars = outcome.text.len(), "recognition finished");
                            RecognitionUpdate::Finished { generation, outcome }
                        }
                        Err(error) => {
                            tracing::warn!(generation, error = %error, "recognition failed");
                            RecognitionUpdate::Failed { generation, error }
                        }
                    };
                    let _ = updates.send(update).await;
                }
                _ = &mut cancel_rx => {
                    tracing::debug!(generation, "recognition task cancelled");
                }
            }
        });

        Self {
            generation,
            cancel_tx: Some(cancel_tx),
            task,
        }
    }

    /// The generation this task was submitted under
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the task has run to completion (or been cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cooperative cancellation.
    ///
    /// The task gets `grace` to wind down on a detached waiter; the caller
    /// proceeds immediately and never blocks on the result. A provider
    /// call that outlives the grace period keeps running detached and its
    /// late result is discarded by the owner's generation check.
    pub fn cancel(mut self, grace: Duration) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        let generation = self.generation;
        let handle = self.task;
        tokio::spawn(async move {
            if tokio::time::timeout(grace, handle).await.is_err() {
                tracing::warn!(
                    generation,
                    grace_secs = grace.as_secs(),
                    "recognition task did not stop within grace period; detaching"
                );
            }
        });
    }
}
