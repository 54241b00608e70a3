//! Volume level computation for live metering

use super::format::AudioFormat;

/// Normalized RMS amplitude of a 16-bit PCM chunk, in `0.0..=1.0`.
///
/// Advisory telemetry for UI meters only; never feeds recognition.
/// Sample widths other than 16-bit report silence.
pub fn rms_level(pcm: &[u8], format: AudioFormat) -> f32 {
    if format.bytes_per_sample() != 2 || pcm.len() < 2 {
        return 0.0;
    }

    let mut sum_squares = 0.0f64;
    let mut count = 0usize;
    for sample in pcm.chunks_exact(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]) as f64;
        sum_squares += value * value;
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }

    let rms = (sum_squares / count as f64).sqrt();
    (rms / i16::MAX as f64).clamp(0.0, 1.0) as f32
}
