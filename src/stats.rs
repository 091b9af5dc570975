use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug, Default)]
pub struct StageStats {
    pub samples: u64,
    pub total_ns: u128,
    pub max_ns: u64,
}

impl StageStats {
    pub fn record(&mut self, duration_ns: u64) {
        self.samples += 1;
        self.total_ns += duration_ns as u128;
        self.max_ns = self.max_ns.max(duration_ns);
    }

    pub fn avg_ns(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.samples as f64
        }
    }

    pub fn avg_ms(&self) -> f64 {
        self.avg_ns() / 1_000_000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max_ns as f64 / 1_000_000.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    // Producer side
    pub bytes_written: u64,
    pub bytes_overwritten: u64,
    pub writes_rejected: u64,
    pub bytes_rejected: u64,

    // Extraction side
    pub windows_emitted: u64,
    pub read_misses: u64,
    pub idle_waits: u64,
    pub consumer_errors: u64,

    pub dispatch: StageStats,
}

/// Shared counters; cloned into the writer, the loop and the session.
#[derive(Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<RuntimeStats>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.update(|stats| *stats = RuntimeStats::default());
    }

    pub fn update<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut RuntimeStats),
    {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        update_fn(&mut stats);
    }

    pub fn snapshot(&self) -> RuntimeStats {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_updates_and_snapshot() {
        let h = StatsHandle::new();
        h.update(|s| {
            s.windows_emitted += 2;
            s.dispatch.record(1_000_000);
        });
        let snap = h.snapshot();
        assert_eq!(snap.windows_emitted, 2);
        assert_eq!(snap.dispatch.samples, 1);
        assert_eq!(snap.dispatch.max_ns, 1_000_000);
    }

    #[test]
    fn clones_share_counters_and_reset_clears_them() {
        let h = StatsHandle::new();
        let writer_side = h.clone();
        writer_side.update(|s| s.bytes_overwritten += 64);
        assert_eq!(h.snapshot().bytes_overwritten, 64);

        h.reset();
        assert_eq!(writer_side.snapshot().bytes_overwritten, 0);
    }

    #[test]
    fn stage_stats_report_milliseconds() {
        let mut s = StageStats::default();
        assert_eq!(s.avg_ms(), 0.0);
        s.record(2_000_000);
        s.record(4_000_000);
        assert_eq!(s.avg_ms(), 3.0);
        assert_eq!(s.max_ms(), 4.0);
    }
}
