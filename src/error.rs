use thiserror::Error;

/// Errors surfaced by the windowing stage
#[derive(Error, Debug)]
pub enum WindowError {
    /// Window geometry or buffer sizing that would stall or misalign the pipeline
    #[error("Invalid window configuration: {0}")]
    InvalidConfig(String),

    /// Write refused under `OverflowPolicy::Reject`
    #[error("Circular buffer full: {requested} bytes requested, {free} bytes free")]
    CapacityExceeded { requested: usize, free: usize },

    #[error("WAV source error: {0}")]
    Source(#[from] hound::Error),

    #[error("Failed to spawn extraction thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Extraction loop is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, WindowError>;
