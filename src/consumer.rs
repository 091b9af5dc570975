use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;

use crate::window::Window;

/// Receiver of completed windows (the classifier side).
///
/// Called synchronously from the extraction loop, one window at a time. A slow
/// consumer stalls extraction; queue internally if that matters.
pub trait WindowConsumer: Send {
    fn consume(&mut self, window: Window) -> Result<()>;
}

impl<F> WindowConsumer for F
where
    F: FnMut(Window) -> Result<()> + Send,
{
    fn consume(&mut self, window: Window) -> Result<()> {
        self(window)
    }
}

/// Blocking hand-off to another thread. The send waits while a bounded channel
/// is full, so the channel's capacity is the consumer's queue.
pub struct ChannelConsumer {
    tx: Sender<Window>,
}

impl ChannelConsumer {
    pub fn new(tx: Sender<Window>) -> Self {
        Self { tx }
    }
}

impl WindowConsumer for ChannelConsumer {
    fn consume(&mut self, window: Window) -> Result<()> {
        self.tx
            .send(window)
            .map_err(|e| anyhow!("window receiver disconnected (window {})", e.0.index()))
    }
}

/// Consumer that discards every window (for testing/debugging)
pub struct DiscardConsumer;

impl WindowConsumer for DiscardConsumer {
    fn consume(&mut self, _window: Window) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(index: u64) -> Window {
        Window::new(index, 0, vec![0; 4])
    }

    #[test]
    fn closure_consumer_sees_each_window() {
        let mut seen = Vec::new();
        {
            let mut consumer = |w: Window| -> Result<()> {
                seen.push(w.index());
                Ok(())
            };
            consumer.consume(window(0)).unwrap();
            consumer.consume(window(1)).unwrap();
        }
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn channel_consumer_forwards_and_reports_disconnect() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut tx = ChannelConsumer::new(tx);
        tx.consume(window(5)).unwrap();
        assert_eq!(rx.recv().unwrap().index(), 5);

        drop(rx);
        let err = tx.consume(window(6)).unwrap_err();
        assert!(err.to_string().contains("window 6"));
    }

    #[test]
    fn discard_accepts_everything() {
        let mut c = DiscardConsumer;
        assert!(c.consume(window(0)).is_ok());
    }
}
