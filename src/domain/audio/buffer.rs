//! Session-scoped audio buffer
//!
//! An `AudioBuffer` belongs to exactly one capture session and lives
//! exactly as long as it. There is deliberately no way to clear a buffer:
//! a new recording always constructs a new buffer, so frames from an
//! earlier or aborted session can never leak into a later one.

use std::sync::Arc;

use thiserror::Error;

use super::format::AudioFormat;

/// Buffer errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("Chunk of {len} bytes is not a multiple of the {frame_size}-byte frame size")]
    FormatMismatch { len: usize, frame_size: usize },

    #[error("Buffer is sealed; no further audio can be appended")]
    Sealed,

    #[error("Snapshot requested before the capture session stopped")]
    NotReady,
}

/// Append-only container for raw PCM chunks plus format metadata.
///
/// The buffer accepts appends while its session records and is sealed when
/// the session stops; a full [`AudioSnapshot`] is only available after
/// sealing. [`recent`](AudioBuffer::recent) may be called at any time and
/// serves live level metering only.
#[derive(Debug)]
pub struct AudioBuffer {
    format: AudioFormat,
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
    sealed: bool,
}

impl AudioBuffer {
    /// Create an empty buffer for the given format
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            chunks: Vec::new(),
            total_bytes: 0,
            sealed: false,
        }
    }

    /// The format every chunk in this buffer conforms to
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Total number of buffered bytes
    pub fn len(&self) -> usize {
        self.total_bytes
    }

    /// Returns `true` when no audio has been appended
    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    /// Buffered duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.format.duration_of(self.total_bytes)
    }

    /// Append one PCM chunk.
    ///
    /// Fails with [`BufferError::FormatMismatch`] if the chunk length is not
    /// a whole number of frames, and with [`BufferError::Sealed`] once the
    /// owning session has stopped.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), BufferError> {
        if self.sealed {
            return Err(BufferError::Sealed);
        }

        let frame_size = self.format.frame_size();
        if frame_size == 0 || chunk.len() % frame_size != 0 {
            return Err(BufferError::FormatMismatch {
                len: chunk.len(),
                frame_size,
            });
        }

        if chunk.is_empty() {
            return Ok(());
        }

        self.total_bytes += chunk.len();
        self.chunks.push(chunk.to_vec());
        Ok(())
    }

    /// Freeze the buffer. Idempotent; appends are rejected afterwards.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Returns `true` once the buffer has been sealed
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Immutable view of the full accumulated content.
    ///
    /// Only available after [`seal`](AudioBuffer::seal); before that the
    /// explicit [`BufferError::NotReady`] is returned rather than a partial
    /// (or silently padded) result.
    pub fn snapshot(&self) -> Result<AudioSnapshot, BufferError> {
        if !self.sealed {
            return Err(BufferError::NotReady);
        }

        let mut data = Vec::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            data.extend_from_slice(chunk);
        }

        Ok(AudioSnapshot {
            data: Arc::from(data),
            format: self.format,
        })
    }

    /// The last `seconds` of audio, computed from the byte rate.
    ///
    /// Returns everything buffered when less than `seconds` is available and
    /// an empty vec for an empty buffer; silence is never synthesized. Safe
    /// to call while recording (used for live metering, never recognition).
    pub fn recent(&self, seconds: f64) -> Vec<u8> {
        if seconds <= 0.0 || self.total_bytes == 0 {
            return Vec::new();
        }

        let wanted = (seconds * self.format.bytes_per_second() as f64) as usize;
        // Round down to a whole frame so callers always see aligned samples.
        let frame_size = self.format.frame_size();
        let wanted = (wanted / frame_size) * frame_size;
        let wanted = wanted.min(self.total_bytes);
        if wanted == 0 {
            return Vec::new();
        }

        let mut tail = Vec::with_capacity(wanted);
        let mut remaining = wanted;
        for chunk in self.chunks.iter().rev() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(chunk.len());
            tail.extend_from_slice(&chunk[chunk.len() - take..]);
            remaining -= take;
        }
        tail.reverse();
        tail
    }
}

/// Immutable read of a buffer's full contents, taken once the owning
/// session has stopped. Cheap to clone and share across tasks.
#[derive(Debug, Clone)]
pub struct AudioSnapshot {
    data: Arc<[u8]>,
    format: AudioFormat,
}

impl AudioSnapshot {
    /// Build a snapshot directly from raw bytes (test and adapter helper)
    pub fn from_bytes(data: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            data: Arc::from(data),
            format,
        }
    }

    /// Raw PCM bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The format the bytes were captured in
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` when the snapshot holds no audio
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.format.duration_of(self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> AudioBuffer {
        AudioBuffer::new(AudioFormat::speech_16k())
    }

    #[test]
    fn append_accumulates_length() {
        let mut buf = buffer();
        buf.append(&[0u8; 320]).unwrap();
        buf.append(&[0u8; 640]).unwrap();
        assert_eq!(buf.len(), 960);
    }

    #[test]
    fn append_rejects_partial_frame() {
        let mut buf = buffer();
        let err = buf.append(&[0u8; 3]).unwrap_err();
        assert_eq!(
            err,
            BufferError::FormatMismatch {
                len: 3,
                frame_size: 2
            }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn append_rejects_partial_frame_stereo() {
        let mut buf = AudioBuffer::new(AudioFormat::new(16_000, 2, 2));
        assert!(buf.append(&[0u8; 6]).is_err());
        assert!(buf.append(&[0u8; 8]).is_ok());
    }

    #[test]
    fn append_after_seal_fails() {
        let mut buf = buffer();
        buf.append(&[0u8; 2]).unwrap();
        buf.seal();
        assert_eq!(buf.append(&[0u8; 2]).unwrap_err(), BufferError::Sealed);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn snapshot_before_seal_is_not_ready() {
        let mut buf = buffer();
        buf.append(&[0u8; 32]).unwrap();
        assert_eq!(buf.snapshot().unwrap_err(), BufferError::NotReady);
    }

    #[test]
    fn snapshot_length_equals_sum_of_chunks() {
        let mut buf = buffer();
        buf.append(&[1u8; 320]).unwrap();
        buf.append(&[2u8; 480]).unwrap();
        buf.append(&[3u8; 200]).unwrap();
        buf.seal();

        let snap = buf.snapshot().unwrap();
        assert_eq!(snap.len(), 1000);
        assert_eq!(&snap.data()[..320], &[1u8; 320][..]);
        assert_eq!(&snap.data()[320..800], &[2u8; 480][..]);
    }

    #[test]
    fn snapshot_of_empty_sealed_buffer_is_empty() {
        let mut buf = buffer();
        buf.seal();
        let snap = buf.snapshot().unwrap();
        assert!(snap.is_empty());
        assert_eq!(snap.duration_secs(), 0.0);
    }

    #[test]
    fn seal_is_idempotent() {
        let mut buf = buffer();
        buf.seal();
        buf.seal();
        assert!(buf.is_sealed());
    }

    #[test]
    fn recent_returns_tail() {
        let mut buf = buffer();
        // One second of zeros followed by half a second of ones.
        buf.append(&vec![0u8; 32_000]).unwrap();
        buf.append(&vec![1u8; 16_000]).unwrap();

        let tail = buf.recent(0.5);
        assert_eq!(tail.len(), 16_000);
        assert!(tail.iter().all(|&b| b == 1));
    }

    #[test]
    fn recent_spans_chunk_boundary() {
        let mut buf = buffer();
        buf.append(&vec![0u8; 32_000]).unwrap();
        buf.append(&vec![1u8; 8_000]).unwrap();

        // 0.5 s = 16000 bytes: 8000 ones plus the 8000 zeros before them.
        let tail = buf.recent(0.5);
        assert_eq!(tail.len(), 16_000);
        assert!(tail[..8_000].iter().all(|&b| b == 0));
        assert!(tail[8_000..].iter().all(|&b| b == 1));
    }

    #[test]
    fn recent_of_empty_buffer_is_empty() {
        let buf = buffer();
        assert!(buf.recent(1.0).is_empty());
    }

    #[test]
    fn recent_caps_at_buffered_length() {
        let mut buf = buffer();
        buf.append(&[7u8; 640]).unwrap();
        assert_eq!(buf.recent(10.0).len(), 640);
    }

    #[test]
    fn recent_with_nonpositive_seconds_is_empty() {
        let mut buf = buffer();
        buf.append(&[0u8; 64]).unwrap();
        assert!(buf.recent(0.0).is_empty());
        assert!(buf.recent(-1.0).is_empty());
    }

    #[test]
    fn duration_tracks_appends() {
        let mut buf = buffer();
        buf.append(&vec![0u8; 16_000]).unwrap();
        assert!((buf.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn snapshot_is_cheap_to_clone() {
        let mut buf = buffer();
        buf.append(&[9u8; 64]).unwrap();
        buf.seal();
        let snap = buf.snapshot().unwrap();
        let copy = snap.clone();
        assert_eq!(snap.data().as_ptr(), copy.data().as_ptr());
    }
}
