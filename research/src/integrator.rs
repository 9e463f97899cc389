//! StepResultIntegrator - merges step outputs into the final report input

use std::collections::HashSet;

use knowledgestore::KnowledgeItem;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A negation cue used to flag a pair of findings as potentially contradictory.
const NEGATION_MARKERS: &[&str] = &["not", "never", "no longer", "cannot", "isn't", "doesn't", "won't", "false"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub a_source: String,
    pub b_source: String,
    pub a_excerpt: String,
    pub b_excerpt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedReport {
    pub findings: Vec<String>,
    pub sources: Vec<String>,
    pub gaps: Vec<String>,
    pub contradictions: Vec<Contradiction>,
    pub confidence: f64,
}

pub struct StepResultIntegrator {
    pub dedup_threshold: f64,
}

impl Default for StepResultIntegrator {
    fn default() -> Self {
        Self { dedup_threshold: 0.8 }
    }
}

impl StepResultIntegrator {
    /// Merges `items` into a structured report, deduplicating near-identical
    /// findings, flagging contradictions, and carrying over the gaps noted by
    /// the caller's last convergence snapshot.
    pub fn integrate(&self, items: &[KnowledgeItem], gaps: Vec<String>) -> IntegratedReport {
        let deduped = self.dedup(items);
        let contradictions = self.find_contradictions(&deduped);
        let confidence = self.weighted_confidence(&deduped, contradictions.len());

        let mut sources: Vec<String> = Vec::new();
        let mut seen_sources = HashSet::new();
        for item in &deduped {
            if seen_sources.insert(item.source_id.clone()) {
                sources.push(item.source_id.clone());
            }
        }

        IntegratedReport {
            findings: deduped.iter().map(|i| i.summary.clone()).collect(),
            sources,
            gaps,
            contradictions,
            confidence,
        }
    }

    /// Drops items whose content is a near-duplicate (Jaccard similarity over
    /// `dedup_threshold` on whitespace-tokenised, lowercased content) of an
    /// item already kept.
    fn dedup(&self, items: &[KnowledgeItem]) -> Vec<KnowledgeItem> {
        let mut kept: Vec<(HashSet<String>, KnowledgeItem)> = Vec::new();
        for item in items {
            let tokens = tokenize(&item.content);
            let is_duplicate = kept.iter().any(|(kept_tokens, _)| jaccard(&tokens, kept_tokens) > self.dedup_threshold);
            if is_duplicate {
                debug!(id = %item.id, "Dropped near-duplicate finding");
                continue;
            }
            kept.push((tokens, item.clone()));
        }
        kept.into_iter().map(|(_, item)| item).collect()
    }

    /// Flags pairs of findings where one carries a negation cue the other
    /// lacks while sharing enough vocabulary to plausibly be about the same
    /// topic, or where both cite differing bare numbers about shared terms.
    fn find_contradictions(&self, items: &[KnowledgeItem]) -> Vec<Contradiction> {
        let mut contradictions = Vec::new();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let a = &items[i];
                let b = &items[j];
                let a_tokens = tokenize(&a.content);
                let b_tokens = tokenize(&b.content);
                if jaccard(&a_tokens, &b_tokens) < 0.2 {
                    continue;
                }
                let a_negated = has_negation(&a.content);
                let b_negated = has_negation(&b.content);
                let negation_conflict = a_negated != b_negated;

                let a_numbers = numbers_in(&a.content);
                let b_numbers = numbers_in(&b.content);
                let numeric_conflict = !a_numbers.is_empty() && !b_numbers.is_empty() && a_numbers != b_numbers;

                if negation_conflict || numeric_conflict {
                    contradictions.push(Contradiction {
                        a_source: a.source_id.clone(),
                        b_source: b.source_id.clone(),
                        a_excerpt: a.summary.clone(),
                        b_excerpt: b.summary.clone(),
                    });
                }
            }
        }
        contradictions
    }

    /// Weighted average of item confidences, weighted toward later (more
    /// recent) items, then penalised proportionally to contradiction count.
    fn weighted_confidence(&self, items: &[KnowledgeItem], contradiction_count: usize) -> f64 {
        if items.is_empty() {
            return 0.0;
        }
        let n = items.len();
        let weight_sum: f64 = (1..=n).map(|i| i as f64).sum();
        let weighted: f64 = items.iter().enumerate().map(|(idx, item)| item.confidence * (idx + 1) as f64).sum();
        let base = weighted / weight_sum;
        let penalty = (contradiction_count as f64 * 0.1).min(0.5);
        (base - penalty).clamp(0.0, 1.0)
    }
}

fn tokenize(content: &str) -> HashSet<String> {
    content.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()).filter(|w| !w.is_empty()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn has_negation(content: &str) -> bool {
    let lower = content.to_lowercase();
    NEGATION_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn numbers_in(content: &str) -> Vec<String> {
    content.split_whitespace().filter(|w| w.chars().any(|c| c.is_ascii_digit())).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledgestore::SourceKind;

    fn item(id: &str, source: &str, summary: &str, content: &str) -> KnowledgeItem {
        KnowledgeItem::new(id, source, SourceKind::Web, summary, content, Vec::new())
    }

    #[test]
    fn near_duplicate_content_is_deduped() {
        let integrator = StepResultIntegrator::default();
        let items = vec![
            item("1", "a.example", "UNESCO founded 1945", "UNESCO was founded in 1945 after world war two"),
            item("2", "b.example", "UNESCO founded 1945 (dup)", "UNESCO was founded in 1945, after World War Two"),
        ];
        let report = integrator.integrate(&items, Vec::new());
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn distinct_content_is_kept() {
        let integrator = StepResultIntegrator::default();
        let items = vec![
            item("1", "a.example", "UNESCO founded 1945", "UNESCO was founded in 1945"),
            item("2", "b.example", "UNESCO headquarters in Paris", "UNESCO headquarters is located in Paris France"),
        ];
        let report = integrator.integrate(&items, Vec::new());
        assert_eq!(report.findings.len(), 2);
    }

    #[test]
    fn negation_conflict_is_flagged() {
        let integrator = StepResultIntegrator::default();
        let items = vec![
            item("1", "a.example", "founding year", "the treaty was ratified in 1945 by all member states"),
            item("2", "b.example", "founding year disputed", "the treaty was not ratified in 1945 by all member states"),
        ];
        let report = integrator.integrate(&items, Vec::new());
        assert_eq!(report.contradictions.len(), 1);
    }

    #[test]
    fn numeric_conflict_on_shared_topic_is_flagged() {
        let integrator = StepResultIntegrator::default();
        let items = vec![
            item("1", "a.example", "member count", "the organisation has 193 member states today"),
            item("2", "b.example", "member count disputed", "the organisation has 195 member states today"),
        ];
        let report = integrator.integrate(&items, Vec::new());
        assert_eq!(report.contradictions.len(), 1);
    }

    #[test]
    fn confidence_is_penalised_by_contradictions() {
        let integrator = StepResultIntegrator::default();
        let clean = vec![
            item("1", "a.example", "x", "a stable fact about something with no conflicts present here"),
            item("2", "b.example", "y", "a second unrelated fact about another distinct topic entirely"),
        ];
        let conflicting = vec![
            item("1", "a.example", "x", "the count is 10 for this topic"),
            item("2", "b.example", "y", "the count is 20 for this topic"),
        ];
        let clean_report = integrator.integrate(&clean, Vec::new());
        let conflict_report = integrator.integrate(&conflicting, Vec::new());
        assert!(conflict_report.confidence < clean_report.confidence);
    }

    #[test]
    fn gaps_pass_through_unchanged() {
        let integrator = StepResultIntegrator::default();
        let report = integrator.integrate(&[], vec!["missing recent sources".to_string()]);
        assert_eq!(report.gaps, vec!["missing recent sources".to_string()]);
        assert_eq!(report.confidence, 0.0);
    }
}
