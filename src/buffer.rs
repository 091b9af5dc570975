//! Bounded byte ring shared by exactly one writer and one reader.
//!
//! The ring is a `ringbuf::HeapRb<u8>` behind a mutex rather than the split
//! lock-free halves: overwrite-oldest needs the producer to discard unread
//! bytes, which only the consumer half may do. Ownership still enforces the
//! single-producer/single-consumer contract, since neither handle is `Clone`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use tracing::{debug, warn};

use crate::config::OverflowPolicy;
use crate::error::{Result, WindowError};
use crate::stats::StatsHandle;

struct Shared {
    ring: Mutex<HeapRb<u8>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HeapRb<u8>> {
        // Every ring operation completes under the lock, so a poisoned guard
        // still points at a consistent ring.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn occupancy(&self) -> usize {
        self.lock().occupied_len()
    }
}

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    /// Bytes from this write now stored in the ring
    pub written: usize,
    /// Bytes lost to make room, old unread data and any input beyond capacity
    pub overwritten: usize,
}

pub struct CircularBuffer {
    shared: Arc<Shared>,
    stats: StatsHandle,
}

impl CircularBuffer {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        Self::with_stats(capacity, policy, StatsHandle::new())
    }

    pub fn with_stats(capacity: usize, policy: OverflowPolicy, stats: StatsHandle) -> Result<Self> {
        if capacity == 0 {
            return Err(WindowError::InvalidConfig(
                "circular buffer capacity must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                ring: Mutex::new(HeapRb::new(capacity)),
                capacity,
                policy,
            }),
            stats,
        })
    }

    /// Hand out the single writer and the single reader.
    pub fn split(self) -> (BufferWriter, BufferReader) {
        // One pending wakeup is enough: the reader drains everything it can per wake.
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let writer = BufferWriter {
            shared: Arc::clone(&self.shared),
            stats: self.stats,
            wake_tx,
        };
        let reader = BufferReader {
            shared: self.shared,
            wake_rx,
        };
        (writer, reader)
    }
}

/// Producer half, held by the capture side
pub struct BufferWriter {
    shared: Arc<Shared>,
    stats: StatsHandle,
    wake_tx: Sender<()>,
}

impl BufferWriter {
    /// Append bytes. Never blocks on the reader; a full ring is resolved by the
    /// configured overflow policy.
    pub fn write(&mut self, data: &[u8]) -> Result<WriteReport> {
        if data.is_empty() {
            return Ok(WriteReport::default());
        }

        let report = {
            let mut ring = self.shared.lock();
            let free = ring.vacant_len();

            if data.len() > free && self.shared.policy == OverflowPolicy::Reject {
                drop(ring);
                self.stats.update(|s| {
                    s.writes_rejected += 1;
                    s.bytes_rejected += data.len() as u64;
                });
                warn!(requested = data.len(), free, "circular buffer full, write rejected");
                return Err(WindowError::CapacityExceeded {
                    requested: data.len(),
                    free,
                });
            }

            // Only the newest `capacity` bytes of an oversized write can survive.
            let keep = &data[data.len().saturating_sub(self.shared.capacity)..];
            let dropped_old = keep.len().saturating_sub(free);
            if dropped_old > 0 {
                ring.skip(dropped_old);
            }
            let written = ring.push_slice(keep);
            WriteReport {
                written,
                overwritten: dropped_old + (data.len() - keep.len()),
            }
        };

        self.stats.update(|s| {
            s.bytes_written += report.written as u64;
            s.bytes_overwritten += report.overwritten as u64;
        });
        if report.overwritten > 0 {
            warn!(
                lost = report.overwritten,
                capacity = self.shared.capacity,
                "circular buffer overflow, oldest audio overwritten"
            );
        }

        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => debug!("reader gone, wakeup dropped"),
        }

        Ok(report)
    }

    /// Append interleaved 16-bit samples as little-endian PCM.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<WriteReport> {
        if cfg!(target_endian = "little") {
            self.write(bytemuck::cast_slice(samples))
        } else {
            let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
            self.write(&bytes)
        }
    }

    pub fn occupancy(&self) -> usize {
        self.shared.occupancy()
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.occupancy()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Consumer half, held by the extraction side
pub struct BufferReader {
    shared: Arc<Shared>,
    wake_rx: Receiver<()>,
}

impl BufferReader {
    /// Take exactly `len` bytes, or nothing at all when fewer are stored.
    pub fn read(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut ring = self.shared.lock();
        if ring.occupied_len() < len {
            return None;
        }
        let mut out = vec![0u8; len];
        let popped = ring.pop_slice(&mut out);
        debug_assert_eq!(popped, len);
        Some(out)
    }

    pub fn occupancy(&self) -> usize {
        self.shared.occupancy()
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.occupancy()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Fires (coalesced) after each successful write.
    pub(crate) fn wakeups(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}
