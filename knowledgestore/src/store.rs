//! Core KnowledgeStore implementation

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::bloom::BloomFilter;

/// Where a knowledge item originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Web,
    Code,
    Reflection,
    User,
}

/// A single piece of knowledge gathered during a research run.
///
/// Immutable once inserted. A corrected fact is inserted as a new item whose
/// `metadata` carries a `supersedes` id rather than mutating the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub source_id: String,
    pub source_kind: SourceKind,
    pub summary: String,
    pub content: String,
    pub keywords: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub metadata: Value,
}

impl KnowledgeItem {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        source_kind: SourceKind,
        summary: impl Into<String>,
        content: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            source_kind,
            summary: summary.into(),
            content: content.into(),
            keywords,
            timestamp: Utc::now(),
            confidence: 1.0,
            metadata: Value::Null,
        }
    }

    /// The id of the item this one supersedes, if `metadata.supersedes` is set.
    pub fn supersedes(&self) -> Option<&str> {
        self.metadata.get("supersedes").and_then(Value::as_str)
    }
}

/// Normalises whitespace and Unicode case before the dedup check, which
/// screens candidates through a Bloom filter and then an exact compare.
fn normalize(content: &str) -> String {
    let collapsed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

fn content_hash(source_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(b"|");
    hasher.update(normalize(content).as_bytes());
    format!("{:x}", hasher.finalize())
}

struct Inner {
    items: Vec<KnowledgeItem>,
    seen_hashes: BloomFilter,
    exact_hashes: std::collections::HashSet<String>,
}

/// Append-only collection of [`KnowledgeItem`]s for a single research run.
///
/// Thread-safe: all operations take `&self` and serialize through an internal
/// mutex, so the orchestrator's ingestion step (the only writer, per the
/// concurrency model) can be shared across an `Arc` without extra wrapping.
pub struct KnowledgeStore {
    inner: Mutex<Inner>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        debug!("Opening knowledge store");
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                seen_hashes: BloomFilter::new(1 << 16, 4),
                exact_hashes: std::collections::HashSet::new(),
            }),
        }
    }

    /// Insert an item, deduplicating by normalised `(source_id, content)` hash.
    ///
    /// Returns `true` if the item was newly inserted, `false` if it was a
    /// duplicate (in which case the store is left unchanged: no timestamp
    /// update, no count change).
    pub fn add(&self, item: KnowledgeItem) -> bool {
        let hash = content_hash(&item.source_id, &item.content);
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if guard.seen_hashes.maybe_contains(&hash) && guard.exact_hashes.contains(&hash) {
            debug!(id = %item.id, "Duplicate item, skipping");
            return false;
        }

        guard.seen_hashes.insert(&hash);
        guard.exact_hashes.insert(hash);
        guard.items.push(item);
        true
    }

    /// Number of items currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the top-`k` items whose keywords best overlap the query keywords,
    /// ranked by overlap count then recency.
    pub fn find_by_keywords(&self, keywords: &[String], k: usize) -> Vec<KnowledgeItem> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let query: std::collections::HashSet<String> = keywords.iter().map(|s| s.to_lowercase()).collect();

        let mut scored: Vec<(usize, &KnowledgeItem)> = guard
            .items
            .iter()
            .map(|item| {
                let overlap = item
                    .keywords
                    .iter()
                    .filter(|kw| query.contains(&kw.to_lowercase()))
                    .count();
                (overlap, item)
            })
            .filter(|(overlap, _)| *overlap > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.timestamp.cmp(&a.1.timestamp)));
        scored.into_iter().take(k).map(|(_, item)| item.clone()).collect()
    }

    /// Coverage score per named axis: fraction of distinct keyword-bearing
    /// items whose keywords intersect that axis's keyword set, clamped to
    /// `[0, 1]`.
    pub fn coverage_against(&self, axes: &HashMap<String, Vec<String>>) -> CoverageReport {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let total = guard.items.len().max(1) as f64;

        let mut scores = HashMap::new();
        for (axis_name, axis_keywords) in axes {
            let axis_set: std::collections::HashSet<String> =
                axis_keywords.iter().map(|s| s.to_lowercase()).collect();
            let matching = guard
                .items
                .iter()
                .filter(|item| item.keywords.iter().any(|kw| axis_set.contains(&kw.to_lowercase())))
                .count() as f64;
            scores.insert(axis_name.clone(), (matching / total).clamp(0.0, 1.0));
        }
        CoverageReport { scores }
    }

    /// Concatenated, truncated summary text for the top-k most recent items,
    /// used as the knowledge digest fed to prompts and the answer evaluator.
    pub fn summary_text(&self, k: usize, max_chars_per_item: usize) -> String {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut items: Vec<&KnowledgeItem> = guard.items.iter().collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        items
            .into_iter()
            .take(k)
            .map(|item| {
                let truncated: String = item.summary.chars().take(max_chars_per_item).collect();
                format!("[{}] {}", item.source_id, truncated)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Distinct source ids (typically URLs) referenced by stored items.
    pub fn sources(&self) -> Vec<String> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for item in &guard.items {
            if seen.insert(item.source_id.clone()) {
                out.push(item.source_id.clone());
            }
        }
        out
    }

    /// Snapshot of all items, oldest first. Intended for the step result
    /// integrator and tests; not for hot-path use.
    pub fn snapshot(&self) -> Vec<KnowledgeItem> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).items.clone()
    }
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-axis coverage scores in `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub scores: HashMap<String, f64>,
}

impl CoverageReport {
    pub fn min_score(&self) -> f64 {
        self.scores.values().cloned().fold(1.0, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, source: &str, content: &str, keywords: &[&str]) -> KnowledgeItem {
        KnowledgeItem::new(
            id,
            source,
            SourceKind::Web,
            format!("summary of {id}"),
            content,
            keywords.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn add_returns_true_for_new_item() {
        let store = KnowledgeStore::new();
        assert!(store.add(item("1", "http://a", "hello world", &["hello"])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_content_is_rejected_and_count_unchanged() {
        let store = KnowledgeStore::new();
        assert!(store.add(item("1", "http://a", "Hello   World", &["hello"])));
        // Same source + normalised-equal content (whitespace/case differ) is a dup.
        assert!(!store.add(item("2", "http://a", "hello world", &["hello"])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_source_same_content_is_not_a_duplicate() {
        let store = KnowledgeStore::new();
        assert!(store.add(item("1", "http://a", "same text", &["x"])));
        assert!(store.add(item("2", "http://b", "same text", &["x"])));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn find_by_keywords_ranks_by_overlap() {
        let store = KnowledgeStore::new();
        store.add(item("1", "http://a", "a", &["rust", "async"]));
        store.add(item("2", "http://b", "b", &["rust"]));
        let found = store.find_by_keywords(&["rust".to_string(), "async".to_string()], 2);
        assert_eq!(found[0].id, "1");
    }

    #[test]
    fn coverage_against_axes() {
        let store = KnowledgeStore::new();
        store.add(item("1", "http://a", "a", &["history"]));
        store.add(item("2", "http://b", "b", &["impact"]));

        let mut axes = HashMap::new();
        axes.insert("history".to_string(), vec!["history".to_string()]);
        axes.insert("applications".to_string(), vec!["applications".to_string()]);

        let report = store.coverage_against(&axes);
        assert_eq!(report.scores["history"], 0.5);
        assert_eq!(report.scores["applications"], 0.0);
    }

    #[test]
    fn sources_are_distinct_and_ordered_by_first_seen() {
        let store = KnowledgeStore::new();
        store.add(item("1", "http://a", "x", &[]));
        store.add(item("2", "http://b", "y", &[]));
        store.add(item("3", "http://a", "z", &[]));
        assert_eq!(store.sources(), vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn supersedes_reference_is_readable_from_metadata() {
        let mut superseding = item("2", "http://a", "corrected", &[]);
        superseding.metadata = serde_json::json!({ "supersedes": "1" });
        assert_eq!(superseding.supersedes(), Some("1"));
    }
}
