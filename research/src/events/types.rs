//! Event types for research run activity streaming

use serde::{Deserialize, Serialize};

use crate::cache::Origin;
use crate::domain::ActionKind;

/// The vocabulary of everything observable during a research run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    IterationStart { run_id: String, step: u32 },
    IterationComplete { run_id: String, step: u32, success: bool },
    ActionStart { run_id: String, step: u32, action: ActionKind },
    ActionComplete { run_id: String, step: u32, action: ActionKind, success: bool },

    UrlStart { run_id: String, url: String },
    UrlComplete { run_id: String, url: String, origin: Origin, size: usize },
    UrlFailed { run_id: String, url: String, error: String },
    CacheHit { run_id: String, url: String },
    Retrying { run_id: String, url: String, attempt: u32, delay_ms: u64 },
    FallbackTriggered { run_id: String, url: String, origin: Origin },

    ConcurrencyChange { run_id: String, previous: usize, current: usize, reason: String },

    AnswerEvaluated { run_id: String, step: u32, passed: bool, reason: String },

    Complete { run_id: String, completion_reason: String, step_count: u32 },
    Error { run_id: String, context: String, message: String },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::IterationStart { .. } => "iterationStart",
            Event::IterationComplete { .. } => "iterationComplete",
            Event::ActionStart { .. } => "actionStart",
            Event::ActionComplete { .. } => "actionComplete",
            Event::UrlStart { .. } => "urlStart",
            Event::UrlComplete { .. } => "urlComplete",
            Event::UrlFailed { .. } => "urlFailed",
            Event::CacheHit { .. } => "cacheHit",
            Event::Retrying { .. } => "retrying",
            Event::FallbackTriggered { .. } => "fallbackTriggered",
            Event::ConcurrencyChange { .. } => "concurrencyChange",
            Event::AnswerEvaluated { .. } => "answerEvaluated",
            Event::Complete { .. } => "complete",
            Event::Error { .. } => "error",
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            Event::IterationStart { run_id, .. }
            | Event::IterationComplete { run_id, .. }
            | Event::ActionStart { run_id, .. }
            | Event::ActionComplete { run_id, .. }
            | Event::UrlStart { run_id, .. }
            | Event::UrlComplete { run_id, .. }
            | Event::UrlFailed { run_id, .. }
            | Event::CacheHit { run_id, .. }
            | Event::Retrying { run_id, .. }
            | Event::FallbackTriggered { run_id, .. }
            | Event::ConcurrencyChange { run_id, .. }
            | Event::AnswerEvaluated { run_id, .. }
            | Event::Complete { run_id, .. }
            | Event::Error { run_id, .. } => Some(run_id),
        }
    }
}

/// Non-blocking sink contract: implementations may buffer or drop events
/// under backpressure but must never block the emitting caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}
