//! Minimal RIFF/WAVE export for captured snapshots

use std::io;
use std::path::Path;

use crate::domain::audio::AudioSnapshot;

/// Serialize a snapshot as a PCM WAV file image
pub fn wav_bytes(snapshot: &AudioSnapshot) -> Vec<u8> {
    let format = snapshot.format();
    let data_len = snapshot.len() as u32;
    let byte_rate = format.bytes_per_second() as u32;
    let block_align = format.frame_size() as u16;
    let bits_per_sample = format.bytes_per_sample() * 8;

    let mut out = Vec::with_capacity(44 + snapshot.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk: PCM, 16 bytes
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&format.channels().to_le_bytes());
    out.extend_from_slice(&format.sample_rate_hz().to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(snapshot.data());
    out
}

/// Write a snapshot to disk as a WAV file
pub async fn write_wav(path: &Path, snapshot: &AudioSnapshot) -> io::Result<()> {
    tokio::fs::write(path, wav_bytes(snapshot)).await
}
