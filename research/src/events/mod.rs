//! Event vocabulary and non-blocking distribution for a research run
//!
//! [`EventSink`] is an explicit contract whose `emit()` never blocks the
//! caller. [`EventBus`] is the concrete sink, backed by a
//! `tokio::sync::broadcast` channel the way the ambient stack's task loop
//! distributes its own activity stream.

mod bus;
mod logger;
mod types;

pub use bus::{EventBus, EventEmitter, DEFAULT_CHANNEL_CAPACITY};
pub use logger::EventLogger;
pub use types::{Event, EventSink};
