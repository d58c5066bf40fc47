//! Change-sink abstraction for decoupling the supervisor from transport.
//!
//! The supervisor pushes [`ChangeFrame`]s without knowing how they reach
//! the host; the daemon installs a channel-backed sink, tests install a
//! counting double.

use tokio::sync::mpsc;

use super::ChangeFrame;

/// Trait for delivering change frames without knowledge of transport.
pub trait ChangeSink: Send + Sync {
    /// Hands one frame to the transport. Must not block.
    fn push(&self, frame: ChangeFrame);
}

/// No-op sink for tests and headless probing.
pub struct NoopChangeSink;

impl ChangeSink for NoopChangeSink {
    fn push(&self, _frame: ChangeFrame) {
        // No-op
    }
}

/// Logging sink for debugging event flow.
pub struct LoggingChangeSink;

impl ChangeSink for LoggingChangeSink {
    fn push(&self, frame: ChangeFrame) {
        tracing::debug!(key = %frame.key, payload = %frame.payload, "change_frame");
    }
}

/// Sink backed by an unbounded channel, drained by the host poster.
pub struct ChannelChangeSink {
    tx: mpsc::UnboundedSender<ChangeFrame>,
}

impl ChannelChangeSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChangeFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChangeSink for ChannelChangeSink {
    fn push(&self, frame: ChangeFrame) {
        // Receiver gone means the host poster stopped; frames are dropped.
        let _ = self.tx.send(frame);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Test sink that records every frame.
    pub struct RecordingSink {
        pub frames: Mutex<Vec<ChangeFrame>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self { frames: Mutex::new(Vec::new()) }
        }
    }

    impl ChangeSink for RecordingSink {
        fn push(&self, frame: ChangeFrame) {
            self.frames.lock().push(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Zone;
    use serde_json::json;

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelChangeSink::new();
        sink.push(ChangeFrame::new("s", Zone::Main, "PW", json!("ON")));
        sink.push(ChangeFrame::new("s", Zone::Main, "MV", json!(42.5)));

        assert_eq!(rx.recv().await.unwrap().key, "devices::s::1::PW");
        assert_eq!(rx.recv().await.unwrap().key, "devices::s::1::MV");
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelChangeSink::new();
        drop(rx);
        sink.push(ChangeFrame::new("s", Zone::Main, "PW", json!("ON")));
    }
}
