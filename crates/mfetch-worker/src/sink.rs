//! Event sinks for status events.

use mfetch_models::StatusEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Receives the status events of a request.
///
/// Sending never fails: events for a client that went away are dropped.
pub trait EventSink: Send + Sync {
    fn send(&self, event: StatusEvent);
}

/// Sink feeding an unbounded channel, typically drained by a connection's
/// writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: StatusEvent) {
        if self.tx.send(event).is_err() {
            debug!("Status channel closed, dropping event");
        }
    }
}
