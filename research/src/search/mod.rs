//! SearchProvider - consumed capability for web search

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::LlmError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub weight: f64,
}

/// Search providers fail the same way an LLM call can: a ranking backend
/// outage is an external-collaborator failure, not a core design concern, so
/// it reuses [`LlmError`]'s provider/rate-limit shape rather than inventing
/// a parallel taxonomy.
pub type SearchError = LlmError;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>, SearchError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    pub struct MockSearchProvider {
        name: String,
        scripted: Mutex<HashMap<String, Vec<Hit>>>,
    }

    impl MockSearchProvider {
        pub fn new(name: impl Into<String>) -> Self {
            Self { name: name.into(), scripted: Mutex::new(HashMap::new()) }
        }

        pub fn set_results(&self, query: &str, hits: Vec<Hit>) {
            self.scripted.lock().unwrap().insert(query.to_string(), hits);
        }
    }

    #[async_trait]
    impl SearchProvider for MockSearchProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>, SearchError> {
            let guard = self.scripted.lock().unwrap();
            let hits = guard.get(query).cloned().unwrap_or_else(|| {
                vec![Hit {
                    url: format!("https://example.com/{}", query.replace(' ', "-")),
                    title: format!("Result for {query}"),
                    snippet: "a mock search result".into(),
                    weight: 0.9,
                }]
            });
            Ok(hits.into_iter().take(top_k).collect())
        }
    }
}
