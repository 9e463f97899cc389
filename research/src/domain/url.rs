//! The per-run URL frontier

use tracing::debug;

/// A candidate URL queued for possible fetching.
#[derive(Debug, Clone)]
pub struct WeightedUrl {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub weight: f64,
    pub source_provider: String,
    pub visited: bool,
    pub failed: bool,
}

impl WeightedUrl {
    pub fn new(url: impl Into<String>, weight: f64, source_provider: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            snippet: String::new(),
            weight,
            source_provider: source_provider.into(),
            visited: false,
            failed: false,
        }
    }
}

/// The orchestrator's per-run URL frontier.
///
/// Mutated only by the orchestrator: worker tasks dequeue via handles they
/// are given, never enqueue or mark state themselves.
#[derive(Debug, Default)]
pub struct UrlFrontier {
    entries: Vec<WeightedUrl>,
}

impl UrlFrontier {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert a URL if not already present (by url string); existing entries
    /// keep their visited/failed state and take the higher of the two weights.
    pub fn enqueue(&mut self, candidate: WeightedUrl) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.url == candidate.url) {
            if candidate.weight > existing.weight {
                existing.weight = candidate.weight;
            }
            debug!(url = %candidate.url, "Already present, weight merged");
            return;
        }
        debug!(url = %candidate.url, weight = %candidate.weight, "Inserted into frontier");
        self.entries.push(candidate);
    }

    /// Top-`k` unvisited, non-failed URLs with weight `>= min_score`, ranked
    /// by weight descending.
    pub fn top_unvisited(&self, k: usize, min_score: f64) -> Vec<WeightedUrl> {
        let mut candidates: Vec<&WeightedUrl> = self
            .entries
            .iter()
            .filter(|e| !e.visited && !e.failed && e.weight >= min_score)
            .collect();
        candidates.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        candidates.into_iter().take(k).cloned().collect()
    }

    pub fn mark_visited(&mut self, url: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.url == url) {
            entry.visited = true;
            entry.failed = false;
        }
    }

    /// Mark a failure. If `retryable`, the URL is reset to unvisited so a
    /// later step may retry it (invariant 3: visited/failed are mutually
    /// exclusive only for the current attempt).
    pub fn mark_failed(&mut self, url: &str, retryable: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.url == url) {
            entry.failed = true;
            entry.visited = !retryable;
        }
    }

    pub fn unvisited_count(&self, min_score: f64) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.visited && !e.failed && e.weight >= min_score)
            .count()
    }

    pub fn is_drained(&self, min_score: f64) -> bool {
        self.unvisited_count(min_score) == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dedups_by_url_keeping_max_weight() {
        let mut frontier = UrlFrontier::new();
        frontier.enqueue(WeightedUrl::new("http://a", 0.5, "primary"));
        frontier.enqueue(WeightedUrl::new("http://a", 0.9, "secondary"));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.top_unvisited(10, 0.0)[0].weight, 0.9);
    }

    #[test]
    fn top_unvisited_respects_threshold_and_order() {
        let mut frontier = UrlFrontier::new();
        frontier.enqueue(WeightedUrl::new("http://low", 0.3, "p"));
        frontier.enqueue(WeightedUrl::new("http://high", 0.95, "p"));
        frontier.enqueue(WeightedUrl::new("http://mid", 0.85, "p"));

        let top = frontier.top_unvisited(5, 0.8);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].url, "http://high");
        assert_eq!(top[1].url, "http://mid");
    }

    #[test]
    fn mark_visited_excludes_from_top_unvisited() {
        let mut frontier = UrlFrontier::new();
        frontier.enqueue(WeightedUrl::new("http://a", 0.9, "p"));
        frontier.mark_visited("http://a");
        assert!(frontier.top_unvisited(5, 0.0).is_empty());
    }

    #[test]
    fn retryable_failure_resets_to_unvisited() {
        let mut frontier = UrlFrontier::new();
        frontier.enqueue(WeightedUrl::new("http://a", 0.9, "p"));
        frontier.mark_failed("http://a", true);
        assert_eq!(frontier.top_unvisited(5, 0.0).len(), 1);

        frontier.mark_failed("http://a", false);
        assert!(frontier.top_unvisited(5, 0.0).is_empty());
    }

    #[test]
    fn is_drained_reflects_min_score() {
        let mut frontier = UrlFrontier::new();
        frontier.enqueue(WeightedUrl::new("http://a", 0.5, "p"));
        assert!(frontier.is_drained(0.8));
        assert!(!frontier.is_drained(0.3));
    }
}
