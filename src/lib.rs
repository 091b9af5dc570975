//! Re-slices a live 16-bit PCM byte stream into fixed-size, overlapping
//! analysis windows for a downstream classifier.
//!
//! capture → [`BufferWriter::write`] → ring → [`ExtractionLoop`] →
//! [`WindowExtractor`] → [`WindowConsumer`]

mod buffer;
mod config;
mod consumer;
mod error;
mod extraction_loop;
mod extractor;
#[cfg(all(not(test), feature = "python"))]
mod python;
mod session;
mod source;
mod stats;
mod window;

pub use buffer::{BufferReader, BufferWriter, CircularBuffer, WriteReport};
pub use config::{OverflowPolicy, WindowConfig, WindowParams, BYTES_PER_SAMPLE};
pub use consumer::{ChannelConsumer, DiscardConsumer, WindowConsumer};
pub use error::{Result, WindowError};
pub use extraction_loop::{stop_signal, ExtractionLoop, LoopState, StopHandle, StopSignal};
pub use extractor::WindowExtractor;
pub use session::WindowSession;
pub use source::WavSource;
pub use stats::{RuntimeStats, StageStats, StatsHandle};
pub use window::Window;
