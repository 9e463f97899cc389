//! URLProcessor - single-URL fetch pipeline combining cache, retry,
//! rate-limiting, and fallback, with emitted progress events

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::debug;
use uuid::Uuid;

use crate::cache::{ContentCache, Origin};
use crate::error::FetchError;
use crate::events::{Event, EventEmitter};
use crate::fallback::FallbackChain;
use crate::ratelimit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::scraper::{Content, Scraper};

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub content: Content,
    pub origin: Origin,
    pub from_cache: bool,
}

/// The per-URL pipeline: admission, cache lookup, retried fetch, fallback,
/// and classified failure.
pub struct UrlProcessor {
    pub cache: Arc<ContentCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub scraper: Arc<dyn Scraper>,
    pub archive: Arc<dyn Scraper>,
    pub alt_source: Arc<dyn Scraper>,
    pub retry_policy: RetryPolicy,
    pub fetch_timeout: Duration,
}

impl UrlProcessor {
    pub async fn process(&self, url: &str, emitter: &EventEmitter) -> Result<ProcessOutcome, FetchError> {
        emitter.emit(Event::UrlStart { run_id: emitter.run_id().to_string(), url: url.to_string() });

        if let Some(entry) = self.cache.get(url) {
            emitter.emit(Event::CacheHit { run_id: emitter.run_id().to_string(), url: url.to_string() });
            emitter.emit(Event::UrlComplete {
                run_id: emitter.run_id().to_string(),
                url: url.to_string(),
                origin: entry.current_version.origin,
                size: entry.current_version.size,
            });
            return Ok(ProcessOutcome {
                content: Content { url: entry.url, title: String::new(), content: entry.content, content_type: entry.content_type },
                origin: entry.current_version.origin,
                from_cache: true,
            });
        }

        let _admission = self.rate_limiter.acquire(url).await;

        let scraper = self.scraper.clone();
        let timeout = self.fetch_timeout;
        let primary_result = retry_with_backoff(&self.retry_policy, Some(url), Some(emitter), || {
            let scraper = scraper.clone();
            let url = url.to_string();
            async move { tokio::time::timeout(timeout, scraper.fetch(&url, timeout)).await.unwrap_or(Err(FetchError::Timeout(timeout))) }
        })
        .await;

        match primary_result {
            Ok(content) => {
                let size = content.content.len();
                self.cache.insert(url, content.content.clone(), content.content_type.clone(), content_hash(&content.content), Origin::Primary);
                emitter.emit(Event::UrlComplete { run_id: emitter.run_id().to_string(), url: url.to_string(), origin: Origin::Primary, size });
                Ok(ProcessOutcome { content, origin: Origin::Primary, from_cache: false })
            }
            Err(_retry_exhausted) => {
                let chain = FallbackChain {
                    cache: &self.cache,
                    archive: self.archive.as_ref(),
                    alt_source: self.alt_source.as_ref(),
                    config: Default::default(),
                };
                match chain.fetch(url, Some(emitter)).await {
                    Ok((content, origin)) => {
                        let size = content.content.len();
                        self.cache.insert(url, content.content.clone(), content.content_type.clone(), content_hash(&content.content), origin);
                        emitter.emit(Event::UrlComplete { run_id: emitter.run_id().to_string(), url: url.to_string(), origin, size });
                        Ok(ProcessOutcome { content, origin, from_cache: false })
                    }
                    Err(e) => {
                        emitter.emit(Event::UrlFailed { run_id: emitter.run_id().to_string(), url: url.to_string(), error: e.to_string() });
                        Err(e)
                    }
                }
            }
        }
    }

    /// Runs up to `max_concurrent` fetches in parallel, optionally spacing
    /// admissions by `request_interval`.
    pub async fn process_many(
        &self,
        urls: &[String],
        max_concurrent: usize,
        request_interval: Option<Duration>,
        emitter: &EventEmitter,
    ) -> Vec<(String, Result<ProcessOutcome, FetchError>)> {
        stream::iter(urls.iter().cloned())
            .map(|url| {
                let emitter = emitter.clone();
                async move {
                    if let Some(interval) = request_interval {
                        tokio::time::sleep(interval).await;
                    }
                    let result = self.process(&url, &emitter).await;
                    (url, result)
                }
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await
    }
}

fn content_hash(content: &str) -> String {
    format!("{:x}", Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()))
}
