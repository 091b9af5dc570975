use std::thread::JoinHandle;

use tracing::warn;

use crate::buffer::{BufferWriter, CircularBuffer};
use crate::config::{WindowConfig, WindowParams};
use crate::consumer::WindowConsumer;
use crate::error::{Result, WindowError};
use crate::extraction_loop::{stop_signal, ExtractionLoop, StopHandle};
use crate::extractor::WindowExtractor;
use crate::stats::{RuntimeStats, StatsHandle};

/// One windowing stream: the buffer, the extraction thread and their counters.
///
/// The writer returned by `start` is the only producer handle; move it to the
/// capture thread. Dropping the session stops the loop.
pub struct WindowSession {
    config: WindowConfig,
    params: WindowParams,
    thread: Option<JoinHandle<()>>,
    stop: Option<StopHandle>,
    stats: StatsHandle,
}

impl WindowSession {
    /// Validates the configuration eagerly; nothing runs until `start`.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let params = config.validate()?;
        Ok(Self {
            config,
            params,
            thread: None,
            stop: None,
            stats: StatsHandle::new(),
        })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn params(&self) -> WindowParams {
        self.params
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Allocate a fresh buffer, spawn the extraction loop and return the writer.
    pub fn start<C>(&mut self, consumer: C) -> Result<BufferWriter>
    where
        C: WindowConsumer + 'static,
    {
        if self.is_running() {
            return Err(WindowError::AlreadyRunning);
        }
        self.stats.reset();

        let capacity = self.config.capacity_bytes()?;
        let (writer, reader) =
            CircularBuffer::with_stats(capacity, self.config.overflow, self.stats.clone())?.split();
        let extractor = WindowExtractor::new(reader, self.params)?.with_stats(self.stats.clone());
        let (stop, signal) = stop_signal();

        let mut extraction = ExtractionLoop::new(
            extractor,
            Box::new(consumer),
            signal,
            self.config.poll_interval,
            self.stats.clone(),
        )
        .with_wake_on_write(self.config.wake_on_write);

        let thread = std::thread::Builder::new()
            .name("pcm-window-extract".to_string())
            .spawn(move || {
                extraction.run();
            })
            .map_err(WindowError::Spawn)?;

        self.thread = Some(thread);
        self.stop = Some(stop);
        Ok(writer)
    }

    /// Cancel the loop and wait for it to exit. Any partial window is dropped.
    /// Stopping an idle session is a no-op.
    pub fn stop(&mut self) {
        if let Some(mut stop) = self.stop.take() {
            stop.cancel();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("extraction thread panicked");
            }
        }
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.snapshot()
    }
}

impl Drop for WindowSession {
    fn drop(&mut self) {
        self.stop();
    }
}
