use tracing::debug;

use crate::buffer::BufferReader;
use crate::config::WindowParams;
use crate::error::{Result, WindowError};
use crate::stats::StatsHandle;
use crate::window::Window;

/// Carves fixed-size overlapping windows out of the circular buffer.
///
/// The carry holds bytes already read but not yet emitted. After the first
/// window it is always exactly `overlap_size` long, so every later window is the
/// carry followed by `read_size` fresh bytes.
pub struct WindowExtractor {
    reader: BufferReader,
    params: WindowParams,
    carry: Vec<u8>,
    windows_emitted: u64,
    stream_offset: u64, // Stream position of carry[0]
    stats: StatsHandle,
}

impl WindowExtractor {
    /// Rejects a ring that cannot hold one window; such a pipeline would never
    /// collect enough bytes and stall silently.
    pub fn new(reader: BufferReader, params: WindowParams) -> Result<Self> {
        if reader.capacity() < params.window_size() {
            return Err(WindowError::InvalidConfig(format!(
                "buffer capacity ({} bytes) is smaller than one window ({} bytes)",
                reader.capacity(),
                params.window_size()
            )));
        }
        Ok(Self {
            reader,
            carry: Vec::with_capacity(params.window_size()),
            params,
            windows_emitted: 0,
            stream_offset: 0,
            stats: StatsHandle::new(),
        })
    }

    pub fn with_stats(mut self, stats: StatsHandle) -> Self {
        self.stats = stats;
        self
    }

    /// Bytes the next read asks for. `read_size` in steady state; during warm-up
    /// the last read only tops the carry up to a full window, which keeps the
    /// post-emission carry at exactly `overlap_size` for any geometry.
    fn next_read_len(&self) -> usize {
        self.params
            .read_size()
            .min(self.params.window_size() - self.carry.len())
    }

    /// Try to produce the next window. `None` means "poll again later" and leaves
    /// both the buffer and the carry untouched unless a full read went through.
    pub fn try_extract(&mut self) -> Option<Window> {
        let wanted = self.next_read_len();
        if self.reader.occupancy() < wanted {
            return None;
        }

        let fresh = match self.reader.read(wanted) {
            Some(bytes) => bytes,
            None => {
                self.stats.update(|s| s.read_misses += 1);
                debug!(wanted, "read miss despite sufficient occupancy");
                return None;
            }
        };

        let mut combined = std::mem::take(&mut self.carry);
        combined.extend_from_slice(&fresh);

        if combined.len() < self.params.window_size() {
            debug!(
                carried = combined.len(),
                window_size = self.params.window_size(),
                "warming up"
            );
            self.carry = combined;
            return None;
        }

        let read_size = self.params.read_size();
        self.carry = combined[read_size..].to_vec();
        combined.truncate(self.params.window_size());

        let window = Window::new(self.windows_emitted, self.stream_offset, combined);
        self.windows_emitted += 1;
        self.stream_offset += read_size as u64;
        Some(window)
    }

    pub fn params(&self) -> WindowParams {
        self.params
    }

    pub fn carry(&self) -> &[u8] {
        &self.carry
    }

    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    /// Bytes received but not yet part of an emitted window
    pub fn pending_bytes(&self) -> usize {
        self.carry.len() + self.reader.occupancy()
    }

    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }

    pub fn is_warmed_up(&self) -> bool {
        self.windows_emitted > 0
    }

    pub(crate) fn reader(&self) -> &BufferReader {
        &self.reader
    }
}
