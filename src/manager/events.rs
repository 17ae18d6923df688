//! Pod event publisher
//!
//! Uses a tokio broadcast channel for pub/sub. Publishing never fails:
//! with no subscribers the event is dropped, and slow subscribers see
//! `RecvError::Lagged` rather than blocking the manager.

use tokio::sync::broadcast;

use crate::types::PodEvent;

pub struct EventBus {
    sender: broadcast::Sender<PodEvent>,
}

impl EventBus {
    /// Create an event bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PodEvent> {
        self.sender.subscribe()
    }

    /// Publish to all subscribers; returns how many received it
    pub fn publish(&self, event: PodEvent) -> usize {
        tracing::debug!(target: "btcpod::events", event = event.name(), "Publishing");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::common::config::DEFAULT_EVENT_CAPACITY)
    }
}
