use std::time::Duration;

use crate::error::{Result, WindowError};

/// Stream format is fixed: signed 16-bit little-endian PCM.
pub const BYTES_PER_SAMPLE: usize = 2;

/// What a full circular buffer does with a write that does not fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest unread bytes to make room. The capture side never blocks,
    /// but lost bytes shift the alignment of the next window.
    #[default]
    OverwriteOldest,
    /// Refuse the whole write and report `WindowError::CapacityExceeded`.
    Reject,
}

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub window_ms: u32,
    pub overlap_ms: u32, // 0..window_ms, 1500 keeps half of each window
    pub poll_interval: Duration,
    pub capacity_windows: usize, // Ring capacity expressed in whole windows
    pub overflow: OverflowPolicy,
    pub wake_on_write: bool, // Producer writes cut the idle wait short
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            window_ms: 3_000,
            overlap_ms: 1_500,
            poll_interval: Duration::from_millis(500),
            capacity_windows: 4,
            overflow: OverflowPolicy::OverwriteOldest,
            wake_on_write: true,
        }
    }
}

impl WindowConfig {
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Byte rate of the stream (bytes per second)
    pub fn byte_rate(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame()
    }

    fn ms_to_bytes(&self, ms: u32, what: &str) -> Result<usize> {
        let total = self.byte_rate() as u64 * ms as u64;
        if total % 1000 != 0 || (total / 1000) % self.bytes_per_frame() as u64 != 0 {
            return Err(WindowError::InvalidConfig(format!(
                "{} of {} ms does not fall on a frame boundary at {} Hz",
                what, ms, self.sample_rate
            )));
        }
        Ok((total / 1000) as usize)
    }

    /// Derive the byte-level window geometry, rejecting anything that could stall
    /// or misalign extraction.
    pub fn params(&self) -> Result<WindowParams> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(WindowError::InvalidConfig(
                "sample_rate and channels must be non-zero".to_string(),
            ));
        }
        let window_size = self.ms_to_bytes(self.window_ms, "window")?;
        let overlap_size = self.ms_to_bytes(self.overlap_ms, "overlap")?;
        WindowParams::new(window_size, overlap_size)
    }

    pub fn capacity_bytes(&self) -> Result<usize> {
        let params = self.params()?;
        params
            .window_size
            .checked_mul(self.capacity_windows)
            .ok_or_else(|| WindowError::InvalidConfig("buffer capacity overflows usize".to_string()))
    }

    /// Full validation, run once before anything is allocated.
    pub fn validate(&self) -> Result<WindowParams> {
        let params = self.params()?;
        if self.capacity_windows == 0 {
            return Err(WindowError::InvalidConfig(
                "capacity_windows must hold at least one window".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(WindowError::InvalidConfig(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        self.capacity_bytes()?;
        Ok(params)
    }
}

/// Byte geometry of the sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    window_size: usize,
    overlap_size: usize,
    read_size: usize,
}

impl WindowParams {
    pub fn new(window_size: usize, overlap_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(WindowError::InvalidConfig("window size must be non-zero".to_string()));
        }
        if overlap_size >= window_size {
            return Err(WindowError::InvalidConfig(format!(
                "overlap ({} bytes) must be smaller than the window ({} bytes)",
                overlap_size, window_size
            )));
        }
        Ok(Self {
            window_size,
            overlap_size,
            read_size: window_size - overlap_size,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }

    /// New bytes consumed from the buffer per emitted window
    pub fn read_size(&self) -> usize {
        self.read_size
    }

    /// Reads needed from a cold start before the first window comes out
    pub fn warmup_reads(&self) -> usize {
        (self.window_size + self.read_size - 1) / self.read_size
    }
}
