//! FallbackChain - ordered alternative sources for a URL fetch

use std::time::Duration;

use tracing::debug;

use crate::cache::{ContentCache, Origin};
use crate::error::FetchError;
use crate::events::{Event, EventEmitter};
use crate::scraper::{Content, Scraper};

#[derive(Debug, Clone)]
pub struct FallbackStepConfig {
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub archive: FallbackStepConfig,
    pub alt_source: FallbackStepConfig,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            archive: FallbackStepConfig { timeout: Duration::from_secs(10) },
            alt_source: FallbackStepConfig { timeout: Duration::from_secs(10) },
        }
    }
}

/// An alternative mirror fetcher; distinct from the primary scraper so that
/// tests and production can supply a different backend for "alt-source".
pub type AltSourceScraper = dyn Scraper;

/// Tries a URL fetch through `{ primary-cache (soft-stale), web-archive,
/// alternative-mirror }` in order; the first success wins and its `origin` is
/// propagated so the cache entry records true provenance. Primary-cache here
/// means the last, possibly-expired, `ContentCache` entry — already-tried
/// fresh lookups happen upstream in `URLProcessor`.
pub struct FallbackChain<'a> {
    pub cache: &'a ContentCache,
    pub archive: &'a dyn Scraper,
    pub alt_source: &'a AltSourceScraper,
    pub config: FallbackConfig,
}

impl<'a> FallbackChain<'a> {
    pub async fn fetch(&self, url: &str, emitter: Option<&EventEmitter>) -> Result<(Content, Origin), FetchError> {
        if let Some(entry) = self.cache.get_stale(url) {
            debug!(url, "Soft-stale cache hit");
            if let Some(emitter) = emitter {
                emitter.emit(Event::FallbackTriggered { run_id: emitter.run_id().to_string(), url: url.to_string(), origin: entry.current_version.origin });
            }
            return Ok((
                Content { url: entry.url, title: String::new(), content: entry.content, content_type: entry.content_type },
                entry.current_version.origin,
            ));
        }

        let mut last_err = FetchError::NetworkError("fallback chain exhausted with no sources configured".into());

        if let Some(emitter) = emitter {
            emitter.emit(Event::FallbackTriggered { run_id: emitter.run_id().to_string(), url: url.to_string(), origin: Origin::Archive });
        }
        match tokio::time::timeout(self.config.archive.timeout, self.archive.fetch(url, self.config.archive.timeout)).await {
            Ok(Ok(content)) => return Ok((content, Origin::Archive)),
            Ok(Err(e)) => last_err = e,
            Err(_) => last_err = FetchError::Timeout(self.config.archive.timeout),
        }

        if let Some(emitter) = emitter {
            emitter.emit(Event::FallbackTriggered { run_id: emitter.run_id().to_string(), url: url.to_string(), origin: Origin::AltSource });
        }
        match tokio::time::timeout(self.config.alt_source.timeout, self.alt_source.fetch(url, self.config.alt_source.timeout)).await {
            Ok(Ok(content)) => Ok((content, Origin::AltSource)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let _ = last_err;
                Err(FetchError::Timeout(self.config.alt_source.timeout))
            }
        }
    }
}
