//! EventBus - central pub/sub for research run activity
//!
//! Uses a tokio broadcast channel so `emit()` is non-blocking and never waits
//! on a subscriber; a lagging or absent subscriber simply misses events.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::Event;

/// Default channel capacity (events).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4_096;

/// Central event bus for one or more concurrent research runs.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "Opening event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Fire-and-forget emit; dropped silently if there are no subscribers.
    pub fn emit(&self, event: Event) {
        debug!(event_type = event.event_type(), "Publishing event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn emitter_for(&self, run_id: impl Into<String>) -> EventEmitter {
        EventEmitter { tx: self.tx.clone(), run_id: run_id.into() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap-to-clone handle bound to one run id.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<Event>,
    run_id: String,
}

impl EventEmitter {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, event: Event) {
        debug!(event_type = event.event_type(), "Publishing event");
        let _ = self.tx.send(event);
    }
}

pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionKind;

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn emit_is_received_by_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(Event::IterationStart { run_id: "r1".into(), step: 1 });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "iterationStart");
        assert_eq!(event.run_id(), Some("r1"));
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(Event::Complete { run_id: "r1".into(), completion_reason: "answered".into(), step_count: 3 });
    }

    #[tokio::test]
    async fn emitter_binds_run_id() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("r2");
        emitter.emit(Event::ActionStart { run_id: emitter.run_id().to_string(), step: 1, action: ActionKind::Search });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id(), Some("r2"));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.emit(Event::Complete { run_id: "r3".into(), completion_reason: "answered".into(), step_count: 1 });
        assert_eq!(rx1.recv().await.unwrap().run_id(), Some("r3"));
        assert_eq!(rx2.recv().await.unwrap().run_id(), Some("r3"));
    }
}
