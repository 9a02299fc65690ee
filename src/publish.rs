//! Hand-over of market events to the downstream consumer.

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::MarketEvent;

/// Fire-and-forget sink for market events.
///
/// Publishing never blocks and never reports delivery, the caller
/// does not wait for the consumer.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: MarketEvent);
}

/// [`Publisher`] forwarding events into an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<MarketEvent>,
}

/// Receiving end of a [`ChannelPublisher`].
#[derive(Debug)]
pub struct EventReceiver {
    inner: mpsc::UnboundedReceiver<MarketEvent>,
}

/// Creates a connected publisher/receiver pair.
pub fn channel() -> (ChannelPublisher, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelPublisher { tx }, EventReceiver { inner: rx })
}

impl Publisher for ChannelPublisher {
    fn publish(&self, event: MarketEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            debug!(listing = %event.listing(), "Event receiver dropped, discarding event");
        }
    }
}

impl EventReceiver {
    /// Receives the next event, or `None` if all publishers are dropped.
    pub async fn recv(&mut self) -> Option<MarketEvent> {
        self.inner.recv().await
    }

    /// Receives the next event if one is immediately available.
    pub fn try_recv(&mut self) -> Option<MarketEvent> {
        self.inner.try_recv().ok()
    }
}
