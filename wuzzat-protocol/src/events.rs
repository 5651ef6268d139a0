//! Typed publish/subscribe channel for lifecycle and data notifications.

use tokio::sync::broadcast;

/// Default number of undelivered events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Broadcasts events of one type to every subscriber.
///
/// Emitting never blocks and never fails; a subscriber that falls more than
/// `capacity` events behind observes `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Delivers an event to all current subscribers.
    pub fn emit(&self, event: E) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
