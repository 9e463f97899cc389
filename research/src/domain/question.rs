//! The user-supplied research question

use super::ResearchConfig;

/// A research question plus its immutable run configuration.
#[derive(Debug, Clone)]
pub struct Question {
    pub text: String,
    pub config: ResearchConfig,
}

impl Question {
    pub fn new(text: impl Into<String>, config: ResearchConfig) -> Self {
        Self { text: text.into(), config }
    }
}
