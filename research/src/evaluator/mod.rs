//! AnswerEvaluator - LLM-assisted verdict on whether current knowledge
//! answers the question

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ledger::TokenLedger;
use crate::llm::{ChatMessage, ChatRequest, LlmClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Definitive,
    Freshness,
    Plurality,
    Completeness,
    Attribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub pass: bool,
    pub rationale: String,
    pub dimension: Dimension,
    pub improvement_plan: Option<String>,
}

/// Marker rationale for an LLM call that failed; the orchestrator treats
/// these as non-terminating.
pub const EVALUATOR_UNAVAILABLE: &str = "evaluator-unavailable";

pub struct AnswerEvaluator<'a> {
    pub llm: &'a dyn LlmClient,
    pub ledger: &'a TokenLedger,
}

impl<'a> AnswerEvaluator<'a> {
    /// Evaluates a candidate answer along every dimension, returning the
    /// first failing verdict or the last passing one if all dimensions pass.
    pub async fn evaluate(&self, question: &str, answer: &str, knowledge_summary: &str) -> EvaluationVerdict {
        let dimensions =
            [Dimension::Definitive, Dimension::Freshness, Dimension::Plurality, Dimension::Completeness, Dimension::Attribution];

        let mut last = None;
        for dimension in dimensions {
            let verdict = self.evaluate_dimension(dimension, question, answer, knowledge_summary).await;
            if !verdict.pass {
                return verdict;
            }
            last = Some(verdict);
        }
        last.expect("dimensions is non-empty")
    }

    async fn evaluate_dimension(&self, dimension: Dimension, question: &str, answer: &str, knowledge_summary: &str) -> EvaluationVerdict {
        let prompt = format!(
            "Question: {question}\nCandidate answer: {answer}\nKnowledge summary: {knowledge_summary}\n\
             Judge the answer strictly on the '{dimension:?}' dimension. Reply PASS or FAIL then a one-line rationale."
        );
        let request = ChatRequest { messages: vec![ChatMessage::user(prompt)], temperature: 0.0, max_tokens: 200 };

        match self.llm.chat(request).await {
            Ok(response) => {
                self.ledger.record_usage(response.usage);
                let pass = response.content.trim_start().to_uppercase().starts_with("PASS");
                debug!(?dimension, pass, "Dimension evaluated");
                EvaluationVerdict { pass, rationale: response.content, dimension, improvement_plan: None }
            }
            Err(err) => {
                warn!(?dimension, error = %err, "LLM call failed, degrading to fail-safe verdict");
                EvaluationVerdict { pass: false, rationale: EVALUATOR_UNAVAILABLE.to_string(), dimension, improvement_plan: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmClient;

    #[tokio::test]
    async fn all_dimensions_passing_yields_pass_verdict() {
        let llm = MockLlmClient::with_texts(vec!["PASS definitive", "PASS fresh", "PASS plural", "PASS complete", "PASS attributed"]);
        let ledger = TokenLedger::new(100_000, 0.15);
        let evaluator = AnswerEvaluator { llm: &llm, ledger: &ledger };
        let verdict = evaluator.evaluate("q", "a", "summary").await;
        assert!(verdict.pass);
    }

    #[tokio::test]
    async fn first_failing_dimension_short_circuits() {
        let llm = MockLlmClient::with_texts(vec!["PASS definitive", "FAIL not fresh enough"]);
        let ledger = TokenLedger::new(100_000, 0.15);
        let evaluator = AnswerEvaluator { llm: &llm, ledger: &ledger };
        let verdict = evaluator.evaluate("q", "a", "summary").await;
        assert!(!verdict.pass);
        assert_eq!(verdict.dimension, Dimension::Freshness);
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_fail_safe_verdict() {
        let llm = MockLlmClient::with_texts(vec![]);
        let ledger = TokenLedger::new(100_000, 0.15);
        let evaluator = AnswerEvaluator { llm: &llm, ledger: &ledger };
        let verdict = evaluator.evaluate("q", "a", "summary").await;
        assert!(!verdict.pass);
        assert_eq!(verdict.rationale, EVALUATOR_UNAVAILABLE);
    }

    #[tokio::test]
    async fn evaluation_records_token_usage_on_ledger() {
        let llm = MockLlmClient::with_texts(vec!["PASS", "PASS", "PASS", "PASS", "PASS"]);
        let ledger = TokenLedger::new(100_000, 0.15);
        let evaluator = AnswerEvaluator { llm: &llm, ledger: &ledger };
        evaluator.evaluate("q", "a", "summary").await;
        assert!(ledger.total() > 0);
    }
}
