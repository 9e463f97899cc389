//! Scraper - consumed capability for fetching a URL's content
//!
//! Scraper internals are an external collaborator's responsibility, not this
//! core's. This module defines only the contract and a mock used by tests
//! and the integration harness.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct Content {
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_type: String,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Content, FetchError>;
}

/// A scraper stub for tests: returns scripted responses per URL, or a
/// programmable failure sequence for retry/fallback exercises.
#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub struct MockScraper {
        responses: Mutex<std::collections::HashMap<String, VecDeque<Result<Content, FetchError>>>>,
    }

    impl MockScraper {
        pub fn new() -> Self {
            Self { responses: Mutex::new(std::collections::HashMap::new()) }
        }

        /// Queue a response for `url`; subsequent `fetch()` calls pop in FIFO order.
        pub fn push(&self, url: &str, result: Result<Content, FetchError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(result);
        }
    }

    impl Default for MockScraper {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Scraper for MockScraper {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Content, FetchError> {
            let mut guard = self.responses.lock().unwrap();
            match guard.get_mut(url).and_then(|q| q.pop_front()) {
                Some(result) => result,
                None => Ok(Content {
                    url: url.to_string(),
                    title: "Untitled".into(),
                    content: format!("mock content for {url}"),
                    content_type: "text/html".into(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockScraper;
    use super::*;

    #[tokio::test]
    async fn mock_scraper_returns_default_content_when_unscripted() {
        let scraper = MockScraper::new();
        let content = scraper.fetch("https://example.com", Duration::from_secs(1)).await.unwrap();
        assert!(content.content.contains("example.com"));
    }

    #[tokio::test]
    async fn mock_scraper_pops_scripted_responses_in_order() {
        let scraper = MockScraper::new();
        scraper.push("https://a.example", Err(FetchError::NetworkError("reset".into())));
        scraper.push(
            "https://a.example",
            Ok(Content { url: "https://a.example".into(), title: "A".into(), content: "ok".into(), content_type: "text/html".into() }),
        );

        let first = scraper.fetch("https://a.example", Duration::from_secs(1)).await;
        assert!(first.is_err());
        let second = scraper.fetch("https://a.example", Duration::from_secs(1)).await;
        assert_eq!(second.unwrap().content, "ok");
    }
}
