//! Step actions and the action sum type
//!
//! [`Action`] is a sum type dispatched by pattern match rather than
//! class-inheritance-over-a-base-handler; each variant carries its own
//! params struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Visit,
    Reflect,
    Answer,
    Coding,
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VisitParams {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReflectParams {
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerParams {
    pub draft: String,
    /// Set once the forced-final-answer path (beast mode) has fired.
    pub beast_mode: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CodingParams {
    pub task: String,
}

/// The action the router chose for a step, carrying its parameters.
#[derive(Debug, Clone)]
pub enum Action {
    Search(SearchParams),
    Visit(VisitParams),
    Reflect(ReflectParams),
    Answer(AnswerParams),
    Coding(CodingParams),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Search(_) => ActionKind::Search,
            Action::Visit(_) => ActionKind::Visit,
            Action::Reflect(_) => ActionKind::Reflect,
            Action::Answer(_) => ActionKind::Answer,
            Action::Coding(_) => ActionKind::Coding,
        }
    }
}

/// An append-only record of one orchestrator step.
#[derive(Debug, Clone)]
pub struct StepAction {
    pub step_number: u32,
    pub kind: ActionKind,
    pub think: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub token_usage: Option<TokenUsage>,
}

impl StepAction {
    pub fn new(step_number: u32, kind: ActionKind, think: impl Into<String>) -> Self {
        Self {
            step_number,
            kind,
            think: think.into(),
            timestamp: Utc::now(),
            success: false,
            error: None,
            token_usage: None,
        }
    }

    pub fn mark_success(&mut self, usage: Option<TokenUsage>) {
        self.success = true;
        self.token_usage = usage;
    }

    pub fn mark_failure(&mut self, error: impl Into<String>) {
        self.success = false;
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_kind_matches_variant() {
        assert_eq!(Action::Search(SearchParams::default()).kind(), ActionKind::Search);
        assert_eq!(Action::Answer(AnswerParams::default()).kind(), ActionKind::Answer);
    }

    #[test]
    fn step_action_lifecycle() {
        let mut step = StepAction::new(1, ActionKind::Visit, "visiting top urls");
        assert!(!step.success);
        step.mark_success(Some(TokenUsage { prompt: 10, completion: 5, total: 15 }));
        assert!(step.success);
        assert!(step.error.is_none());
    }
}
