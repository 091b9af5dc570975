use anyhow::anyhow;
use numpy::PyArray1;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyAny;
use std::time::Duration;

use crate::buffer::BufferWriter;
use crate::config::{OverflowPolicy, WindowConfig};
use crate::consumer::WindowConsumer;
use crate::error::WindowError;
use crate::session::WindowSession;
use crate::stats::RuntimeStats;
use crate::window::Window;

fn to_py_err(e: WindowError) -> PyErr {
    match e {
        WindowError::InvalidConfig(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Hands each window to a Python callable as `(index, numpy int16 array)`.
struct PyWindowCallback {
    callback: Py<PyAny>,
}

impl WindowConsumer for PyWindowCallback {
    fn consume(&mut self, window: Window) -> anyhow::Result<()> {
        let outcome = Python::try_attach(|py| -> PyResult<()> {
            let samples = PyArray1::from_vec(py, window.samples());
            self.callback.call1(py, (window.index(), samples))?;
            Ok(())
        });
        match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(anyhow!("Python callback error: {}", e)),
            None => Err(anyhow!("could not acquire the Python interpreter")),
        }
    }
}

#[pyclass]
pub struct WindowEngine {
    session: WindowSession,
    writer: Option<BufferWriter>,
}

#[pymethods]
impl WindowEngine {
    #[new]
    #[pyo3(signature = (
        sample_rate=48000,
        channels=1,
        window_ms=3000,
        overlap_ms=1500,
        poll_interval_ms=500,
        capacity_windows=4,
        overwrite_oldest=true
    ))]
    fn new(
        sample_rate: u32,
        channels: u16,
        window_ms: u32,
        overlap_ms: u32,
        poll_interval_ms: u64,
        capacity_windows: usize,
        overwrite_oldest: bool,
    ) -> PyResult<Self> {
        let config = WindowConfig {
            sample_rate,
            channels,
            window_ms,
            overlap_ms,
            poll_interval: Duration::from_millis(poll_interval_ms),
            capacity_windows,
            overflow: if overwrite_oldest {
                OverflowPolicy::OverwriteOldest
            } else {
                OverflowPolicy::Reject
            },
            ..WindowConfig::default()
        };
        let session = WindowSession::new(config).map_err(to_py_err)?;
        Ok(Self {
            session,
            writer: None,
        })
    }

    #[getter]
    fn window_size(&self) -> usize {
        self.session.params().window_size()
    }

    #[getter]
    fn read_size(&self) -> usize {
        self.session.params().read_size()
    }

    fn start(&mut self, py: Python<'_>, callback: Py<PyAny>) -> PyResult<()> {
        // A running session is replaced, not stacked.
        self.stop(py);
        let writer = self
            .session
            .start(PyWindowCallback { callback })
            .map_err(to_py_err)?;
        self.writer = Some(writer);
        Ok(())
    }

    /// Append raw PCM bytes; returns how many were stored.
    fn write(&mut self, data: &[u8]) -> PyResult<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("engine is not started"))?;
        writer.write(data).map(|r| r.written).map_err(to_py_err)
    }

    fn stop(&mut self, py: Python<'_>) {
        self.writer = None;
        if self.session.is_running() {
            // The loop may be waiting on the interpreter inside the callback.
            let session = &mut self.session;
            py.detach(|| session.stop());
        }
    }

    fn get_stats(&self) -> WindowStats {
        WindowStats::from_runtime(self.session.stats())
    }
}

#[pyclass]
pub struct WindowStats {
    #[pyo3(get)]
    pub bytes_written: u64,
    #[pyo3(get)]
    pub bytes_overwritten: u64,
    #[pyo3(get)]
    pub writes_rejected: u64,
    #[pyo3(get)]
    pub bytes_rejected: u64,
    #[pyo3(get)]
    pub windows_emitted: u64,
    #[pyo3(get)]
    pub read_misses: u64,
    #[pyo3(get)]
    pub idle_waits: u64,
    #[pyo3(get)]
    pub consumer_errors: u64,
    #[pyo3(get)]
    pub dispatch_avg_ms: f64,
    #[pyo3(get)]
    pub dispatch_max_ms: f64,
}

impl WindowStats {
    fn from_runtime(s: RuntimeStats) -> Self {
        Self {
            bytes_written: s.bytes_written,
            bytes_overwritten: s.bytes_overwritten,
            writes_rejected: s.writes_rejected,
            bytes_rejected: s.bytes_rejected,
            windows_emitted: s.windows_emitted,
            read_misses: s.read_misses,
            idle_waits: s.idle_waits,
            consumer_errors: s.consumer_errors,
            dispatch_avg_ms: s.dispatch.avg_ms(),
            dispatch_max_ms: s.dispatch.max_ms(),
        }
    }
}

#[pymodule]
fn pcm_window(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<WindowEngine>()?;
    m.add_class::<WindowStats>()?;
    Ok(())
}
