//! Question type classification

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Factual,
    Exploratory,
    Comparative,
    Causal,
    Procedural,
    Evaluative,
}

impl QuestionType {
    pub fn is_computational(&self) -> bool {
        matches!(self, QuestionType::Procedural)
    }
}
