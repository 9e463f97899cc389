//! RateLimiter - global + per-domain request admission and delay shaping

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use reqwest::Url;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

fn domain_of(url: &str) -> String {
    Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_else(|| url.to_string())
}

struct DomainState {
    inflight: usize,
    last_request_at: Option<Instant>,
}

struct Inner {
    minute_window: VecDeque<Instant>,
    hour_window: VecDeque<Instant>,
    domains: HashMap<String, DomainState>,
}

/// Enforces global per-minute/per-hour admission caps, a per-domain inflight
/// cap, and a minimum spacing interval between requests to the same domain.
pub struct RateLimiter {
    inner: Mutex<Inner>,
    max_per_minute: u64,
    max_per_hour: u64,
    max_per_domain: usize,
    min_domain_interval: Duration,
}

/// RAII guard releasing the per-domain inflight slot on drop.
pub struct Admission<'a> {
    limiter: &'a RateLimiter,
    domain: String,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        let limiter = self.limiter;
        let domain = std::mem::take(&mut self.domain);
        tokio::spawn(async move {
            let mut inner = limiter.inner.lock().await;
            if let Some(state) = inner.domains.get_mut(&domain) {
                state.inflight = state.inflight.saturating_sub(1);
            }
        });
    }
}

impl RateLimiter {
    pub fn new(max_per_minute: u64, max_per_hour: u64, max_per_domain: usize, min_domain_interval: Duration) -> Self {
        debug!(max_per_minute, max_per_hour, max_per_domain, "Opening rate limiter");
        Self {
            inner: Mutex::new(Inner { minute_window: VecDeque::new(), hour_window: VecDeque::new(), domains: HashMap::new() }),
            max_per_minute,
            max_per_hour,
            max_per_domain,
            min_domain_interval,
        }
    }

    /// Blocks (sleeping, not holding the lock) until a global and per-domain
    /// slot is available for `url`, then admits the request.
    pub async fn acquire(&self, url: &str) -> Admission<'_> {
        let domain = domain_of(url);
        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();

                inner.minute_window.retain(|&t| now.duration_since(t) < Duration::from_secs(60));
                inner.hour_window.retain(|&t| now.duration_since(t) < Duration::from_secs(3600));

                let global_ok = (inner.minute_window.len() as u64) < self.max_per_minute
                    && (inner.hour_window.len() as u64) < self.max_per_hour;

                let state = inner.domains.entry(domain.clone()).or_insert(DomainState { inflight: 0, last_request_at: None });
                let domain_ok = state.inflight < self.max_per_domain;
                let spacing_ok = state
                    .last_request_at
                    .map(|last| now.duration_since(last) >= self.min_domain_interval)
                    .unwrap_or(true);

                if global_ok && domain_ok && spacing_ok {
                    inner.minute_window.push_back(now);
                    inner.hour_window.push_back(now);
                    state.inflight += 1;
                    state.last_request_at = Some(now);
                    None
                } else if !spacing_ok {
                    let last = state.last_request_at.expect("spacing_ok false implies Some");
                    Some((last + self.min_domain_interval).saturating_duration_since(now))
                } else {
                    Some(Duration::from_millis(50))
                }
            };

            match wait {
                None => return Admission { limiter: self, domain },
                Some(delay) => tokio::time::sleep(delay.max(Duration::from_millis(1))).await,
            }
        }
    }

    pub async fn domain_inflight(&self, url: &str) -> usize {
        let domain = domain_of(url);
        self.inner.lock().await.domains.get(&domain).map(|s| s.inflight).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn acquire_under_caps_returns_immediately() {
        let limiter = RateLimiter::new(10, 100, 3, Duration::from_millis(0));
        let _a = limiter.acquire("https://a.example/1").await;
        assert_eq!(limiter.domain_inflight("https://a.example/1").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_domain_cap_serialises_excess_requests() {
        let limiter = Arc::new(RateLimiter::new(1000, 1000, 1, Duration::from_millis(0)));
        let admission = limiter.acquire("https://a.example").await;

        let limiter2 = limiter.clone();
        let handle = tokio::spawn(async move {
            let _a = limiter2.acquire("https://a.example").await;
        });

        tokio::task::yield_now().await;
        assert!(!handle.is_finished(), "second acquire should block while first is held");

        drop(admission);
        tokio::time::advance(Duration::from_millis(100)).await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_domains_do_not_share_inflight_budget() {
        let limiter = RateLimiter::new(1000, 1000, 1, Duration::from_millis(0));
        let _a = limiter.acquire("https://a.example").await;
        let _b = limiter.acquire("https://b.example").await;
        assert_eq!(limiter.domain_inflight("https://a.example").await, 1);
        assert_eq!(limiter.domain_inflight("https://b.example").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn minimum_interval_spaces_consecutive_requests() {
        let limiter = RateLimiter::new(1000, 1000, 10, Duration::from_millis(200));
        drop(limiter.acquire("https://a.example").await);

        let start = Instant::now();
        drop(limiter.acquire("https://a.example").await);
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(150));
    }
}
