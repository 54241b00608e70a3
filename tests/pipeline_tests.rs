//! End-to-end pipeline tests
//!
//! Drive the annotation state machine through mock audio sources and
//! recognizers: recording, hand-off, recognition, cancellation and the
//! failure paths.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::timeout;

use voxnote::application::annotation::{
    AnnotationEvent, AnnotationHandle, AnnotationStateMachine,
};
use voxnote::application::ports::{
    AudioSource, CaptureError, DeviceSelector, RecognitionError, RecognitionOutcome, Recognizer,
    RecognizerFactory, SourceFrame, SourceStream,
};
use voxnote::domain::annotation::AnnotationState;
use voxnote::domain::audio::{AudioFormat, AudioSnapshot};
use voxnote::domain::config::VoiceSettings;
use voxnote::domain::error::ConfigurationError;

const WAIT: Duration = Duration::from_secs(5);

/// One scripted delivery from the mock device
#[derive(Clone)]
enum ScriptFrame {
    Chunk(Vec<u8>),
    Fail(String),
}

/// Audio source that plays one script per `open` call; once the scripts
/// run out it opens silent sessions that only deliver on request.
struct ScriptedSource {
    scripts: Mutex<VecDeque<Vec<ScriptFrame>>>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    fn new(scripts: Vec<Vec<ScriptFrame>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            opens: AtomicUsize::new(0),
        })
    }

    fn silent() -> Arc<Self> {
        Self::new(Vec::new())
    }

    fn single(chunks: Vec<Vec<u8>>) -> Arc<Self> {
        Self::new(vec![chunks.into_iter().map(ScriptFrame::Chunk).collect()])
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct ScriptedStream {
    _keepalive: mpsc::Sender<SourceFrame>,
}

impl SourceStream for ScriptedStream {}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn open(
        &self,
        _device: &DeviceSelector,
        _format: AudioFormat,
        frames: mpsc::Sender<SourceFrame>,
    ) -> Result<Box<dyn SourceStream>, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().await.pop_front().unwrap_or_default();
        let keepalive = frames.clone();
        tokio::spawn(async move {
            for frame in script {
                let frame = match frame {
                    ScriptFrame::Chunk(chunk) => SourceFrame::Chunk(chunk),
                    ScriptFrame::Fail(message) => SourceFrame::Failed(message),
                };
                if frames.send(frame).await.is_err() {
                    break;
                }
            }
        });
        Ok(Box::new(ScriptedStream {
            _keepalive: keepalive,
        }))
    }
}

/// Recognizer with a fixed reply, optional latency, and a call counter
#[derive(Debug)]
struct StubRecognizer {
    reply: Result<RecognitionOutcome, RecognitionError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubRecognizer {
    fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(RecognitionOutcome::from_text(text)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(RecognitionOutcome::from_text(text)),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(error: RecognitionError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for StubRecognizer {
    async fn recognize(
        &self,
        _audio: &AudioSnapshot,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Factory that always hands out the same recognizer instance
struct FixedFactory(Arc<StubRecognizer>);

impl RecognizerFactory for FixedFactory {
    fn create(&self, _settings: &VoiceSettings) -> Result<Arc<dyn Recognizer>, ConfigurationError> {
        Ok(Arc::clone(&self.0) as Arc<dyn Recognizer>)
    }
}

fn settings(auto_recognition: bool) -> VoiceSettings {
    VoiceSettings {
        auto_recognition: Some(auto_recognition),
        ..VoiceSettings::defaults()
    }
}

fn spawn(
    source: Arc<ScriptedSource>,
    recognizer: Arc<StubRecognizer>,
    auto_recognition: bool,
) -> AnnotationHandle {
    AnnotationStateMachine::spawn(
        source,
        Arc::new(FixedFactory(recognizer)),
        settings(auto_recognition),
    )
    .expect("pipeline spawns")
}

async fn wait_for_state(
    events: &mut broadcast::Receiver<AnnotationEvent>,
    want: AnnotationState,
) {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(AnnotationEvent::StateChanged(state)) if state == want => return,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {}", want));
}

/// Let the scripted chunks flow into the session buffer
async fn let_audio_flow() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn silence_with_auto_recognition_off_settles_ready_with_empty_text() {
    // 2 s of silence at 16 kHz mono 16-bit.
    let source = ScriptedSource::single(vec![vec![0u8; 64_000]]);
    let recognizer = StubRecognizer::text("should never run");
    let handle = spawn(Arc::clone(&source), Arc::clone(&recognizer), false);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();

    wait_for_state(&mut events, AnnotationState::Ready).await;

    // No recognition task was created and the text stayed empty.
    assert_eq!(recognizer.calls(), 0);
    let capture = handle.last_capture().await.unwrap().expect("capture kept");
    assert_eq!(capture.len(), 64_000);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn auto_recognition_produces_ready_with_text() {
    // 0.5 s at 16 kHz mono 16-bit.
    let source = ScriptedSource::single(vec![vec![0u8; 16_000]]);
    let recognizer = StubRecognizer::text("test");
    let handle = spawn(Arc::clone(&source), Arc::clone(&recognizer), true);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();

    let text = timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(AnnotationEvent::TextChanged(text)) if !text.is_empty() => return text,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("text arrives");
    assert_eq!(text, "test");

    wait_for_state(&mut events, AnnotationState::Ready).await;
    assert_eq!(recognizer.calls(), 1);
    assert_eq!(handle.state().await.unwrap(), AnnotationState::Ready);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn consecutive_recordings_never_share_buffer_contents() {
    // Recording A: 4000 bytes. Recording B: 640 bytes.
    let source = ScriptedSource::new(vec![
        vec![ScriptFrame::Chunk(vec![1u8; 4_000])],
        vec![ScriptFrame::Chunk(vec![2u8; 640])],
    ]);
    let recognizer = StubRecognizer::text("ok");
    let handle = spawn(Arc::clone(&source), recognizer, false);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Ready).await;
    assert_eq!(handle.last_capture().await.unwrap().unwrap().len(), 4_000);
    handle.finalize().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Idle).await;

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Ready).await;

    // B's snapshot length is independent of the 4000 bytes recorded before.
    let second = handle.last_capture().await.unwrap().unwrap();
    assert_eq!(second.len(), 640);
    assert!(second.data().iter().all(|&b| b == 2));
    assert_eq!(source.opens(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn reentrant_start_keeps_exactly_one_session() {
    let source = ScriptedSource::silent();
    let handle = spawn(Arc::clone(&source), StubRecognizer::text("x"), true);

    handle.start_recording().await.unwrap();
    handle.start_recording().await.unwrap();
    handle.start_recording().await.unwrap();

    assert_eq!(handle.state().await.unwrap(), AnnotationState::Recording);
    assert_eq!(source.opens(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn second_submit_while_pending_is_rejected_with_already_in_progress() {
    let source = ScriptedSource::single(vec![vec![0u8; 3_200]]);
    let recognizer = StubRecognizer::slow("slow result", Duration::from_secs(60));
    let handle = spawn(source, Arc::clone(&recognizer), false);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Ready).await;

    // Manual trigger starts one task...
    handle.recognize().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Recognizing).await;
    assert_eq!(recognizer.calls(), 1);

    // ...and a second submit while it is pending is rejected, not queued.
    handle.recognize().await.unwrap();
    let message = timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(AnnotationEvent::ErrorChanged(message)) if !message.is_empty() => {
                    return message
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("rejection surfaces");
    assert!(message.contains("already in progress"));
    assert_eq!(recognizer.calls(), 1);

    handle.cancel().await.unwrap();
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn finalize_twice_emits_the_record_exactly_once() {
    let source = ScriptedSource::single(vec![vec![0u8; 1_600]]);
    let handle = spawn(source, StubRecognizer::text("note to self"), true);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Ready).await;

    handle.finalize().await.unwrap();
    handle.finalize().await.unwrap();

    // Count emissions until the pipeline settles back to idle, then give a
    // hypothetical second emission time to arrive and drain the rest.
    let mut submissions = 0;
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(AnnotationEvent::Submitted(record)) => {
                    assert_eq!(record.text(), "note to self");
                    submissions += 1;
                }
                Ok(AnnotationEvent::StateChanged(AnnotationState::Idle)) => return,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("pipeline returns to idle");

    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = events.try_recv() {
        if matches!(event, AnnotationEvent::Submitted(_)) {
            submissions += 1;
        }
    }
    assert_eq!(submissions, 1, "the record must be emitted exactly once");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn device_failure_surfaces_and_preserves_partial_audio() {
    let source = ScriptedSource::new(vec![vec![
        ScriptFrame::Chunk(vec![5u8; 320]),
        ScriptFrame::Fail("device unplugged".to_string()),
    ]]);
    let recognizer = StubRecognizer::text("never");
    let handle = spawn(source, Arc::clone(&recognizer), true);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();

    let message = timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(AnnotationEvent::ErrorChanged(message)) if !message.is_empty() => {
                    return message
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("failure surfaces");
    assert!(message.contains("device unplugged"));
    assert_eq!(handle.state().await.unwrap(), AnnotationState::Error);

    // Buffered audio up to the failure point stays readable...
    let partial = handle.last_capture().await.unwrap().expect("partial kept");
    assert_eq!(partial.len(), 320);

    // ...but is never offered to recognition, not even manually.
    handle.recognize().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recognizer.calls(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn cancel_during_recognizing_discards_the_late_result() {
    let source = ScriptedSource::single(vec![vec![0u8; 3_200]]);
    let recognizer = StubRecognizer::slow("late result", Duration::from_millis(400));
    let handle = spawn(source, Arc::clone(&recognizer), true);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Recognizing).await;

    handle.cancel().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Idle).await;

    // The provider call resolves after the cancel; its result must not be
    // applied and no record may be emitted.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(handle.state().await.unwrap(), AnnotationState::Idle);
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(
                event,
                AnnotationEvent::Submitted(_) | AnnotationEvent::TextChanged(_)
            ),
            "late result leaked into the pipeline"
        );
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn recognition_failure_keeps_prior_text_for_inspection() {
    let source = ScriptedSource::new(vec![
        vec![ScriptFrame::Chunk(vec![0u8; 1_600])],
    ]);
    let recognizer = StubRecognizer::failing(RecognitionError::TransportFailure(
        "connection reset".to_string(),
    ));
    let handle = spawn(source, recognizer, false);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    let_audio_flow().await;
    handle.stop_recording().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Ready).await;

    // Simulate user-edited text before the (failing) manual recognition.
    handle.set_text("draft annotation").await.unwrap();
    handle.recognize().await.unwrap();
    wait_for_state(&mut events, AnnotationState::Error).await;

    // The failure replaced the state, not the user's partial text.
    let mut cleared = false;
    while let Ok(event) = events.try_recv() {
        if let AnnotationEvent::TextChanged(text) = event {
            if text.is_empty() {
                cleared = true;
            }
        }
    }
    assert!(!cleared, "partial text must not be discarded on failure");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn empty_capture_skips_recognition_and_errors() {
    let source = ScriptedSource::silent();
    let recognizer = StubRecognizer::text("never");
    let handle = spawn(source, Arc::clone(&recognizer), true);
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    handle.stop_recording().await.unwrap();

    wait_for_state(&mut events, AnnotationState::Error).await;
    assert_eq!(recognizer.calls(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn max_duration_auto_stops_and_proceeds() {
    let source = ScriptedSource::single(vec![vec![0u8; 1_600]]);
    let recognizer = StubRecognizer::text("timed out fine");
    let settings = VoiceSettings {
        max_duration_secs: Some(1),
        auto_recognition: Some(true),
        ..VoiceSettings::defaults()
    };
    let handle = AnnotationStateMachine::spawn(
        source,
        Arc::new(FixedFactory(Arc::clone(&recognizer))),
        settings,
    )
    .unwrap();
    let mut events = handle.subscribe();

    handle.start_recording().await.unwrap();
    // No stop call: the session stops itself at max duration.
    wait_for_state(&mut events, AnnotationState::Ready).await;
    assert_eq!(recognizer.calls(), 1);

    handle.shutdown().await.unwrap();
}
