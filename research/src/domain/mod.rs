//! Domain types for the research core
//!
//! `Question` and `ResearchConfig` are created once at run start and are
//! read-only for the life of the run. `WeightedURL` and `StepAction` are
//! owned by the orchestrator and mutated only from its single-threaded loop.

mod classify;
mod config;
mod question;
mod result;
mod step;
mod url;

pub use classify::QuestionType;
pub use config::ResearchConfig;
pub use question::Question;
pub use result::{CompletionReason, Reference, ResearchResult, RunMetadata};
pub use step::{Action, ActionKind, AnswerParams, CodingParams, ReflectParams, SearchParams, StepAction, VisitParams};
pub use url::{UrlFrontier, WeightedUrl};
