use crate::config::WindowConfig;

/// One complete analysis window handed to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    index: u64,         // Sequence number, 0 for the first window of a stream
    stream_offset: u64, // Byte position of data[0] in the original stream
    data: Vec<u8>,
}

impl Window {
    pub(crate) fn new(index: u64, stream_offset: u64, data: Vec<u8>) -> Self {
        Self {
            index,
            stream_offset,
            data,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Decode the window as interleaved little-endian 16-bit samples.
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Start time of the window relative to the start of the stream
    pub fn start_secs(&self, config: &WindowConfig) -> f64 {
        let byte_rate = config.byte_rate();
        if byte_rate == 0 {
            return 0.0;
        }
        self.stream_offset as f64 / byte_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_samples() {
        let w = Window::new(0, 0, vec![0x01, 0x00, 0xff, 0xff, 0x00, 0x80]);
        assert_eq!(w.samples(), vec![1, -1, i16::MIN]);
        assert_eq!(w.len(), 6);
    }

    #[test]
    fn start_time_follows_stream_offset() {
        let config = WindowConfig::default();
        let w = Window::new(3, 144_000 * 3, vec![0; 4]);
        assert_eq!(w.index(), 3);
        assert_eq!(w.start_secs(&config), 4.5);
    }

    #[test]
    fn into_bytes_hands_over_the_data() {
        let w = Window::new(1, 10, vec![9, 8, 7]);
        assert_eq!(w.as_bytes(), &[9, 8, 7]);
        assert_eq!(w.into_bytes(), vec![9, 8, 7]);
    }
}
