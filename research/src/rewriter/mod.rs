//! QueryRewriter - expands a question into layered sub-queries

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::QuestionType;
use crate::ledger::TokenLedger;
use crate::llm::{ChatMessage, ChatRequest, LlmClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Surface,
    Deep,
    Context,
    Domain,
    Meta,
}

const LAYERS: [Layer; 5] = [Layer::Surface, Layer::Deep, Layer::Context, Layer::Domain, Layer::Meta];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayeredQueries {
    pub layer: Layer,
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub question_type: QuestionType,
    pub layers: Vec<LayeredQueries>,
    pub complexity_score: u8,
}

/// Classifies a question from surface lexical cues. The question-word and
/// intent heuristics are deliberately simple: the LLM call (when available)
/// is the real classifier, this is only the deterministic fallback path.
pub fn classify(question: &str) -> QuestionType {
    let lower = question.to_lowercase();
    if lower.contains("compare") || lower.contains(" vs ") || lower.contains("versus") {
        QuestionType::Comparative
    } else if lower.starts_with("why") || lower.contains("cause") || lower.contains("because") {
        QuestionType::Causal
    } else if lower.starts_with("how to") || lower.starts_with("how do i") || lower.starts_with("how can i") {
        QuestionType::Procedural
    } else if lower.contains("best") || lower.contains("should i") || lower.contains("worth it") {
        QuestionType::Evaluative
    } else if lower.starts_with("what") || lower.starts_with("who") || lower.starts_with("when") || lower.starts_with("where") {
        QuestionType::Factual
    } else {
        QuestionType::Exploratory
    }
}

/// Deterministic fallback queries, used when the LLM call fails or is absent.
pub fn fallback_queries(question: &str) -> Vec<LayeredQueries> {
    vec![
        LayeredQueries { layer: Layer::Surface, queries: vec![format!("{question} definition"), format!("{question} overview")] },
        LayeredQueries { layer: Layer::Deep, queries: vec![format!("{question} examples"), format!("{question} details")] },
        LayeredQueries { layer: Layer::Context, queries: vec![format!("{question} history"), format!("{question} background")] },
        LayeredQueries { layer: Layer::Domain, queries: vec![format!("{question} applications"), format!("{question} use cases")] },
        LayeredQueries { layer: Layer::Meta, queries: vec![format!("{question} impact"), format!("{question} criticism")] },
    ]
}

/// Complexity score in [1,10] from length, word count, question-word count,
/// and intent diversity (here: number of distinct layers with queries).
pub fn complexity_score(question: &str, layers: &[LayeredQueries]) -> u8 {
    let len_score = (question.len() as f64 / 20.0).min(3.0);
    let words: Vec<&str> = question.split_whitespace().collect();
    let word_score = (words.len() as f64 / 4.0).min(3.0);
    let question_words = ["what", "why", "how", "when", "where", "who", "which"];
    let qword_score = words
        .iter()
        .filter(|w| question_words.contains(&w.to_lowercase().trim_matches(|c: char| !c.is_alphanumeric())))
        .count() as f64;
    let diversity_score = layers.iter().filter(|l| !l.queries.is_empty()).count() as f64 / 5.0 * 2.0;

    let raw = 1.0 + len_score + word_score + qword_score + diversity_score;
    raw.round().clamp(1.0, 10.0) as u8
}

pub struct QueryRewriter<'a> {
    pub llm: &'a dyn LlmClient,
    pub ledger: &'a TokenLedger,
}

impl<'a> QueryRewriter<'a> {
    pub async fn rewrite(&self, question: &str) -> RewriteResult {
        let question_type = classify(question);
        let mut layers = Vec::new();
        for layer in LAYERS {
            layers.push(self.rewrite_layer(question, layer).await);
        }
        let complexity_score = complexity_score(question, &layers);
        RewriteResult { question_type, layers, complexity_score }
    }

    async fn rewrite_layer(&self, question: &str, layer: Layer) -> LayeredQueries {
        let prompt = format!(
            "Question: {question}\nGenerate 2-3 concrete search queries for the '{layer:?}' intent layer. \
             Reply one query per line, no numbering."
        );
        let request = ChatRequest { messages: vec![ChatMessage::user(prompt)], temperature: 0.3, max_tokens: 150 };

        match self.llm.chat(request).await {
            Ok(response) => {
                self.ledger.record_usage(response.usage);
                let queries: Vec<String> = response.content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
                if queries.is_empty() {
                    debug!(?layer, "Empty LLM response, using fallback queries");
                    fallback_for_layer(question, layer)
                } else {
                    LayeredQueries { layer, queries }
                }
            }
            Err(err) => {
                warn!(?layer, error = %err, "LLM call failed, using deterministic fallback queries");
                fallback_for_layer(question, layer)
            }
        }
    }

    /// Generates follow-up queries from a reflective step's identified gaps.
    pub fn follow_up_queries(&self, gaps: &[String]) -> Vec<String> {
        gaps.iter().map(|gap| format!("{gap} additional sources")).collect()
    }
}

fn fallback_for_layer(question: &str, layer: Layer) -> LayeredQueries {
    fallback_queries(question).into_iter().find(|l| l.layer == layer).expect("fallback_queries covers all layers")
}
