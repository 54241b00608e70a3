//! Cross-platform audio input using cpal
//!
//! Delivers PCM chunks in the session's format (16-bit mono at the
//! requested rate, resampling from the device rate when needed). The
//! cpal stream is confined to its own thread because `cpal::Stream` is
//! not `Send`; the stream handle returned to the session is a guard that
//! shuts that thread down and thereby releases the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rubato::{FftFixedIn, Resampler};
use tokio::sync::mpsc;

use crate::application::ports::{
    AudioSource, CaptureError, DeviceSelector, SourceFrame, SourceStream,
};
use crate::domain::audio::AudioFormat;

/// Resampler input chunk size in frames
const RESAMPLER_CHUNK: usize = 1024;

/// Raw deliveries from the cpal callback to the capture thread
enum RawInput {
    /// Mono f32 samples at the device rate
    Samples(Vec<f32>),
    /// The stream reported an error; capture cannot continue
    Error(String),
}

/// Audio source backed by cpal
#[derive(Debug, Default)]
pub struct CpalAudioSource;

impl CpalAudioSource {
    /// Create a new cpal-based audio source
    pub fn new() -> Self {
        Self
    }
}

/// Guard for one open device. Dropping it stops the capture thread and
/// releases the device.
struct CpalStreamHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SourceStream for CpalStreamHandle {}

impl Drop for CpalStreamHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[async_trait]
impl AudioSource for CpalAudioSource {
    async fn open(
        &self,
        device: &DeviceSelector,
        format: AudioFormat,
        frames: mpsc::Sender<SourceFrame>,
    ) -> Result<Box<dyn SourceStream>, CaptureError> {
        let selector = device.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), CaptureError>>();

        let thread = std::thread::Builder::new()
            .name("voxnote-capture".to_string())
            .spawn(move || capture_thread(selector, format, frames, shutdown_flag, ready_tx))
            .map_err(|e| CaptureError::DeviceBusy(format!("failed to spawn capture thread: {}", e)))?;

        // Wait for the thread to acquire the device without blocking the runtime.
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| CaptureError::DeviceBusy(e.to_string()))?;

        match ready {
            Ok(Ok(())) => Ok(Box::new(CpalStreamHandle {
                shutdown,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::DeviceBusy(
                    "capture thread exited before acquiring the device".to_string(),
                ))
            }
        }
    }
}

/// List the names of all available input devices
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceBusy(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Owns the cpal stream for its whole life: acquire, pump, release.
fn capture_thread(
    selector: DeviceSelector,
    format: AudioFormat,
    frames: mpsc::Sender<SourceFrame>,
    shutdown: Arc<AtomicBool>,
    ready_tx: std_mpsc::Sender<Result<(), CaptureError>>,
) {
    let (raw_tx, raw_rx) = std_mpsc::channel::<RawInput>();

    let (stream, device_rate) = match build_stream(&selector, format.sample_rate_hz(), raw_tx) {
        Ok(built) => built,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let target_rate = format.sample_rate_hz();
    let mut resampler = if device_rate != target_rate {
        match FftFixedIn::<f32>::new(
            device_rate as usize,
            target_rate as usize,
            RESAMPLER_CHUNK,
            2,
            1,
        ) {
            Ok(resampler) => Some(resampler),
            Err(e) => {
                let _ = ready_tx.send(Err(CaptureError::DeviceBusy(format!(
                    "resampler init failed: {}",
                    e
                ))));
                return;
            }
        }
    } else {
        None
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::DeviceBusy(e.to_string())));
        return;
    }

    tracing::debug!(device_rate, target_rate, "input device acquired");
    let _ = ready_tx.send(Ok(()));

    let mut pending: Vec<f32> = Vec::new();
    while !shutdown.load(Ordering::SeqCst) {
        match raw_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(RawInput::Samples(samples)) => {
                pending.extend_from_slice(&samples);
                if !forward_pending(&mut pending, resampler.as_mut(), &frames) {
                    break;
                }
            }
            Ok(RawInput::Error(message)) => {
                let _ = frames.blocking_send(SourceFrame::Failed(message));
                break;
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(stream);
}

/// Push accumulated samples downstream; returns false when the session
/// side hung up.
fn forward_pending(
    pending: &mut Vec<f32>,
    resampler: Option<&mut FftFixedIn<f32>>,
    frames: &mpsc::Sender<SourceFrame>,
) -> bool {
    match resampler {
        Some(resampler) => {
            loop {
                let needed = resampler.input_frames_next();
                if pending.len() < needed {
                    return true;
                }
                let chunk: Vec<Vec<f32>> = vec![pending[..needed].to_vec()];
                pending.drain(..needed);

                match resampler.process(&chunk, None) {
                    Ok(output) => {
                        let bytes = f32_to_pcm16(&output[0]);
                        if frames.blocking_send(SourceFrame::Chunk(bytes)).is_err() {
                            return false;
                        }
                    }
                    Err(e) => {
                        let _ = frames.blocking_send(SourceFrame::Failed(format!(
                            "resampling failed: {}",
                            e
                        )));
                        return false;
                    }
                }
            }
        }
        None => {
            if pending.is_empty() {
                return true;
            }
            let bytes = f32_to_pcm16(pending);
            pending.clear();
            frames.blocking_send(SourceFrame::Chunk(bytes)).is_ok()
        }
    }
}

/// Resolve the device, pick a config and build the input stream.
/// The callback downmixes to mono f32 at the device rate.
fn build_stream(
    selector: &DeviceSelector,
    target_rate: u32,
    raw_tx: std_mpsc::Sender<RawInput>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = match selector {
        DeviceSelector::Default => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("no default input device".to_string()))?,
        DeviceSelector::Named(name) => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceBusy(e.to_string()))?
            .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(name.clone()))?,
    };

    let (config, sample_format) = pick_input_config(&device, target_rate)?;
    let channels = config.channels;
    let device_rate = config.sample_rate.0;

    let error_tx = raw_tx.clone();
    let error_callback = move |err: cpal::StreamError| {
        let _ = error_tx.send(RawInput::Error(err.to_string()));
    };

    let stream = match sample_format {
        SampleFormat::I16 => device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let mono = downmix_i16(data, channels);
                    let _ = raw_tx.send(RawInput::Samples(mono));
                },
                error_callback,
                None,
            )
            .map_err(|e| CaptureError::DeviceBusy(e.to_string()))?,

        SampleFormat::F32 => device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix_f32(data, channels);
                    let _ = raw_tx.send(RawInput::Samples(mono));
                },
                error_callback,
                None,
            )
            .map_err(|e| CaptureError::DeviceBusy(e.to_string()))?,

        other => {
            return Err(CaptureError::DeviceBusy(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    };

    Ok((stream, device_rate))
}

/// Pick a suitable input configuration: i16 or f32 only, prefer mono and
/// configs that can run at the target rate directly.
fn pick_input_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let supported_configs = device
        .supported_input_configs()
        .map_err(|e| CaptureError::DeviceBusy(format!("failed to query configs: {}", e)))?;

    let mut best_config: Option<cpal::SupportedStreamConfigRange> = None;

    for config in supported_configs {
        if config.sample_format() != SampleFormat::I16
            && config.sample_format() != SampleFormat::F32
        {
            continue;
        }

        let includes_target = config.min_sample_rate().0 <= target_rate
            && config.max_sample_rate().0 >= target_rate;

        let is_better = match &best_config {
            None => true,
            Some(current) => {
                let fewer_channels = config.channels() < current.channels();
                let better_rate =
                    includes_target && current.min_sample_rate().0 > target_rate;
                fewer_channels || better_rate
            }
        };
        if is_better {
            best_config = Some(config);
        }
    }

    let config_range = best_config.ok_or_else(|| {
        CaptureError::DeviceBusy("no suitable input config found".to_string())
    })?;

    let sample_rate = if config_range.min_sample_rate().0 <= target_rate
        && config_range.max_sample_rate().0 >= target_rate
    {
        SampleRate(target_rate)
    } else {
        config_range.min_sample_rate()
    };

    let sample_format = config_range.sample_format();
    let config = StreamConfig {
        channels: config_range.channels(),
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    Ok((config, sample_format))
}

/// Mix interleaved i16 channels down to mono f32
fn downmix_i16(samples: &[i16], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.iter().map(|&s| s as f32 / 32768.0).collect();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| s as f32 / 32768.0).sum();
            sum / channels as f32
        })
        .collect()
}

/// Mix interleaved f32 channels down to mono
fn downmix_f32(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert f32 samples to little-endian 16-bit PCM bytes
fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_i16_mono_passthrough() {
        let samples = vec![16384i16, -16384];
        let mono = downmix_i16(&samples, 1);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-3);
        assert!((mono[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn downmix_i16_stereo_averages() {
        let samples = vec![16384i16, 0, 0, -16384];
        let mono = downmix_i16(&samples, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.25).abs() < 1e-3);
        assert!((mono[1] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn downmix_f32_stereo_averages() {
        let samples = vec![1.0f32, 0.0, -1.0, -1.0];
        let mono = downmix_f32(&samples, 2);
        assert_eq!(mono, vec![0.5, -1.0]);
    }

    #[test]
    fn f32_to_pcm16_full_scale() {
        let bytes = f32_to_pcm16(&[1.0, -1.0, 0.0]);
        assert_eq!(bytes.len(), 6);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -32767);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), 0);
    }

    #[test]
    fn f32_to_pcm16_clamps_overdrive() {
        let bytes = f32_to_pcm16(&[2.0, -2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -32767);
    }
}
