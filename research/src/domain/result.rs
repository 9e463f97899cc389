//! The final result of a research run

use chrono::{DateTime, Utc};
use knowledgestore::KnowledgeItem;
use serde::{Deserialize, Serialize};

use super::{QuestionType, StepAction};
use crate::integrator::IntegratedReport;
use crate::ledger::TokenUsage;

/// Why the run stopped, mirroring the orchestrator's terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Answered,
    BudgetExceeded,
    MaxSteps,
    Timeout,
    UserStopped,
}

/// A source cited in the final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub title: String,
    pub quote: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub duration_ms: u64,
    pub step_count: u32,
    pub beast_mode_used: bool,
    pub question_type: QuestionType,
    pub complexity_score: u8,
}

/// The complete, structured output of a research run.
#[derive(Debug, Clone)]
pub struct ResearchResult {
    pub answer: String,
    pub references: Vec<Reference>,
    pub knowledge: Vec<KnowledgeItem>,
    pub steps: Vec<StepAction>,
    pub token_usage: TokenUsage,
    pub metadata: RunMetadata,
    pub completion_reason: CompletionReason,
    /// The integrator's merged view of `knowledge`: deduped findings,
    /// flagged contradictions, carried-over gaps, and a confidence score.
    pub report: IntegratedReport,
}
