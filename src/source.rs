//! File-backed stand-in for a live capture source.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::buffer::BufferWriter;
use crate::config::WindowConfig;
use crate::error::{Result, WindowError};

pub struct WavSource {
    reader: hound::WavReader<BufReader<File>>,
    channels: u16,
    samples_read: u64,
}

impl WavSource {
    /// Open a WAV file whose format matches the stream the windows assume.
    pub fn open<P: AsRef<Path>>(path: P, config: &WindowConfig) -> Result<Self> {
        let reader = hound::WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(WindowError::InvalidConfig(format!(
                "expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        if spec.sample_rate != config.sample_rate || spec.channels != config.channels {
            return Err(WindowError::InvalidConfig(format!(
                "WAV is {} Hz / {} ch, stream expects {} Hz / {} ch",
                spec.sample_rate, spec.channels, config.sample_rate, config.channels
            )));
        }

        info!(
            path = %path.as_ref().display(),
            frames = reader.duration(),
            "opened WAV source"
        );
        Ok(Self {
            reader,
            channels: spec.channels,
            samples_read: 0,
        })
    }

    /// Frames left in the file
    pub fn remaining_frames(&self) -> u64 {
        let frames_read = self.samples_read / self.channels as u64;
        (self.reader.duration() as u64).saturating_sub(frames_read)
    }

    /// Write the whole file into the buffer in chunks of `chunk_frames`, the way a
    /// capture callback delivers audio. Returns the number of bytes written.
    pub fn pump(&mut self, writer: &mut BufferWriter, chunk_frames: usize) -> Result<u64> {
        let chunk_len = chunk_frames.max(1) * self.channels as usize;
        let mut chunk: Vec<i16> = Vec::with_capacity(chunk_len);
        let mut total = 0u64;

        for sample in self.reader.samples::<i16>() {
            chunk.push(sample?);
            self.samples_read += 1;
            if chunk.len() == chunk_len {
                total += writer.write_samples(&chunk)?.written as u64;
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            total += writer.write_samples(&chunk)?.written as u64;
        }
        Ok(total)
    }
}
