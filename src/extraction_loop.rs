use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::consumer::WindowConsumer;
use crate::extractor::WindowExtractor;
use crate::stats::StatsHandle;
use crate::window::Window;

/// Raises the cancellation broadcast. Dropping the handle cancels as well.
pub struct StopHandle {
    tx: Option<Sender<()>>,
}

impl StopHandle {
    /// Idempotent; every `StopSignal` observes it, and a waiting loop wakes at once.
    pub fn cancel(&mut self) {
        // Disconnection rather than a message: every receiver sees it, forever.
        self.tx.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_none()
    }
}

#[derive(Clone)]
pub struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// Non-blocking check
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected) | Ok(()))
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (StopHandle { tx: Some(tx) }, StopSignal { rx })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Polls the extractor and hands every completed window to the consumer.
pub struct ExtractionLoop {
    extractor: WindowExtractor,
    consumer: Box<dyn WindowConsumer>,
    stop: StopSignal,
    poll_interval: Duration,
    wake_on_write: bool,
    stats: StatsHandle,
    state: LoopState,
}

impl ExtractionLoop {
    pub fn new(
        extractor: WindowExtractor,
        consumer: Box<dyn WindowConsumer>,
        stop: StopSignal,
        poll_interval: Duration,
        stats: StatsHandle,
    ) -> Self {
        Self {
            extractor,
            consumer,
            stop,
            poll_interval,
            wake_on_write: false,
            stats,
            state: LoopState::Running,
        }
    }

    /// Let producer writes end an idle wait early. The poll interval stays the
    /// upper bound on how long a ready window can sit in the buffer.
    pub fn with_wake_on_write(mut self, enabled: bool) -> Self {
        self.wake_on_write = enabled;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn extractor(&self) -> &WindowExtractor {
        &self.extractor
    }

    /// Run until cancelled. Data problems and consumer failures never end the
    /// loop; the carry is discarded on exit, not flushed.
    pub fn run(&mut self) -> LoopState {
        self.state = LoopState::Running;
        let params = self.extractor.params();
        info!(
            window_size = params.window_size(),
            overlap_size = params.overlap_size(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "extraction loop started"
        );

        let mut wake_rx = if self.wake_on_write {
            self.extractor.reader().wakeups().clone()
        } else {
            crossbeam_channel::never()
        };

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            if let Some(window) = self.extractor.try_extract() {
                // Re-poll straight away to drain any backlog.
                self.dispatch(window);
                continue;
            }

            self.stats.update(|s| s.idle_waits += 1);
            let mut writer_gone = false;
            crossbeam_channel::select! {
                recv(self.stop.rx) -> _ => break,
                recv(wake_rx) -> msg => writer_gone = msg.is_err(),
                default(self.poll_interval) => {}
            }
            if writer_gone {
                debug!("writer dropped, falling back to interval polling");
                wake_rx = crossbeam_channel::never();
            }
        }

        self.state = LoopState::Stopped;
        info!(
            windows = self.extractor.windows_emitted(),
            discarded = self.extractor.carry_len(),
            "extraction loop stopped"
        );
        self.state
    }

    fn dispatch(&mut self, window: Window) {
        let index = window.index();
        let start = Instant::now();
        let result = self.consumer.consume(window);
        let elapsed = start.elapsed().as_nanos() as u64;

        match result {
            Ok(()) => self.stats.update(|s| {
                s.windows_emitted += 1;
                s.dispatch.record(elapsed);
            }),
            Err(e) => {
                self.stats.update(|s| {
                    s.windows_emitted += 1;
                    s.consumer_errors += 1;
                });
                warn!(index, error = %e, "window consumer failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferWriter, CircularBuffer};
    use crate::config::{OverflowPolicy, WindowParams};
    use std::sync::{Arc, Mutex};

    fn build(
        consumer: Box<dyn WindowConsumer>,
        stats: StatsHandle,
    ) -> (BufferWriter, StopHandle, ExtractionLoop) {
        let (writer, reader) = CircularBuffer::new(256, OverflowPolicy::OverwriteOldest)
            .unwrap()
            .split();
        let extractor = WindowExtractor::new(reader, WindowParams::new(8, 4).unwrap()).unwrap();
        let (handle, signal) = stop_signal();
        let lp = ExtractionLoop::new(extractor, consumer, signal, Duration::from_millis(5), stats);
        (writer, handle, lp)
    }

    #[test]
    fn stop_signal_is_broadcast_and_idempotent() {
        let (mut handle, signal) = stop_signal();
        let other = signal.clone();
        assert!(!signal.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(signal.is_cancelled());
        assert!(other.is_cancelled());
    }

    #[test]
    fn cancelled_loop_reads_and_dispatches_nothing() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let stats = StatsHandle::new();
        let (mut writer, mut handle, mut lp) = build(
            Box::new(move |_w: Window| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                Ok(())
            }),
            stats.clone(),
        );
        writer.write(&[1; 64]).unwrap();
        handle.cancel();

        assert_eq!(lp.run(), LoopState::Stopped);
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(writer.occupancy(), 64);
        assert_eq!(stats.snapshot().windows_emitted, 0);
    }

    #[test]
    fn drains_backlog_then_stops_on_cancel() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let stats = StatsHandle::new();
        let (mut writer, mut handle, mut lp) =
            build(Box::new(crate::consumer::ChannelConsumer::new(tx)), stats.clone());
        let stream: Vec<u8> = (0..20).collect();
        writer.write(&stream).unwrap();

        let worker = std::thread::spawn(move || {
            let state = lp.run();
            (state, lp.extractor().carry_len())
        });
        let windows: Vec<Window> = (0..4).map(|_| rx.recv().unwrap()).collect();
        handle.cancel();
        let (state, carry) = worker.join().unwrap();

        assert_eq!(state, LoopState::Stopped);
        assert_eq!(carry, 4);
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index(), i as u64);
            assert_eq!(w.as_bytes(), &stream[i * 4..i * 4 + 8]);
        }
        assert_eq!(stats.snapshot().windows_emitted, 4);
    }

    #[test]
    fn consumer_errors_do_not_stop_the_loop() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        let stats = StatsHandle::new();
        let (mut writer, mut handle, mut lp) = build(
            Box::new(move |_w: Window| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                anyhow::bail!("classifier unavailable")
            }),
            stats.clone(),
        );
        writer.write(&[0; 16]).unwrap();

        let worker = std::thread::spawn(move || lp.run());
        while stats.snapshot().consumer_errors < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.cancel();
        assert_eq!(worker.join().unwrap(), LoopState::Stopped);
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(stats.snapshot().consumer_errors, 3);
    }

    #[test]
    fn wake_on_write_beats_the_poll_interval() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (writer, reader) = CircularBuffer::new(256, OverflowPolicy::OverwriteOldest)
            .unwrap()
            .split();
        let extractor = WindowExtractor::new(reader, WindowParams::new(8, 0).unwrap()).unwrap();
        let (mut handle, signal) = stop_signal();
        let mut lp = ExtractionLoop::new(
            extractor,
            Box::new(crate::consumer::ChannelConsumer::new(tx)),
            signal,
            Duration::from_secs(30),
            StatsHandle::new(),
        )
        .with_wake_on_write(true);
        let mut writer = writer;

        let worker = std::thread::spawn(move || lp.run());
        std::thread::sleep(Duration::from_millis(20));
        writer.write(&[3; 8]).unwrap();

        let window = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(window.as_bytes(), &[3; 8]);
        handle.cancel();
        assert_eq!(worker.join().unwrap(), LoopState::Stopped);
    }
}
