//! TokenLedger - cumulative prompt/completion token counts vs budget

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Running `{prompt, completion, total}` cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self { prompt, completion, total: prompt + completion }
    }
}

/// Authoritative counter of cumulative LLM token consumption for a run.
///
/// All operations are atomic (`Record` uses `fetch_add`), so concurrent
/// callers never overcount even though the orchestrator loop itself is
/// single-threaded — LLM calls made from concurrent URL-processing workers
/// (e.g. per-source summarisation) may still record through the same ledger.
pub struct TokenLedger {
    prompt: AtomicU64,
    completion: AtomicU64,
    budget: u64,
    reserve_final_ratio: f64,
}

impl TokenLedger {
    pub fn new(budget: u64, reserve_final_ratio: f64) -> Self {
        debug!(budget, reserve_final_ratio, "Opening token ledger");
        Self {
            prompt: AtomicU64::new(0),
            completion: AtomicU64::new(0),
            budget,
            reserve_final_ratio: reserve_final_ratio.clamp(0.0, 1.0),
        }
    }

    /// Record a completed LLM call's token usage.
    pub fn record(&self, prompt: u64, completion: u64) {
        debug!(prompt, completion, "Recording token usage");
        self.prompt.fetch_add(prompt, Ordering::SeqCst);
        self.completion.fetch_add(completion, Ordering::SeqCst);
    }

    pub fn record_usage(&self, usage: TokenUsage) {
        self.record(usage.prompt, usage.completion);
    }

    pub fn total(&self) -> u64 {
        self.prompt.load(Ordering::SeqCst) + self.completion.load(Ordering::SeqCst)
    }

    pub fn usage(&self) -> TokenUsage {
        let prompt = self.prompt.load(Ordering::SeqCst);
        let completion = self.completion.load(Ordering::SeqCst);
        TokenUsage::new(prompt, completion)
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.total())
    }

    /// True if spending `estimated` more tokens would still fit the budget.
    pub fn can_afford(&self, estimated: u64) -> bool {
        self.total() + estimated <= self.budget
    }

    /// True once `total >= budget * (1 - reserve_final_ratio)` — the point at
    /// which the remainder should be held back for a forced final answer.
    ///
    /// This implementation treats `reserve_final_ratio` as a fraction of the
    /// *total* budget (see DESIGN.md Open Question (a)).
    pub fn reserve_exceeded(&self) -> bool {
        let threshold = (self.budget as f64 * (1.0 - self.reserve_final_ratio)).max(0.0);
        self.total() as f64 >= threshold
    }

    /// True once the remaining budget fraction has fallen to or below
    /// `threshold` (the run's configured `beastModeThreshold`). Distinct from
    /// `reserve_exceeded`, which is gated on `reserve_final_ratio` instead —
    /// the two coincide only when a run configures them to the same value.
    pub fn remaining_fraction_at_or_below(&self, threshold: f64) -> bool {
        if self.budget == 0 {
            return true;
        }
        (self.remaining() as f64 / self.budget as f64) <= threshold.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates() {
        let ledger = TokenLedger::new(1000, 0.15);
        ledger.record(10, 5);
        ledger.record(20, 5);
        assert_eq!(ledger.total(), 40);
        assert_eq!(ledger.usage(), TokenUsage::new(30, 10));
    }

    #[test]
    fn remaining_never_underflows() {
        let ledger = TokenLedger::new(10, 0.0);
        ledger.record(100, 0);
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn can_afford_respects_budget() {
        let ledger = TokenLedger::new(100, 0.0);
        ledger.record(90, 0);
        assert!(ledger.can_afford(10));
        assert!(!ledger.can_afford(11));
    }

    #[test]
    fn reserve_exceeded_at_threshold() {
        let ledger = TokenLedger::new(1000, 0.15);
        // threshold = 850
        ledger.record(849, 0);
        assert!(!ledger.reserve_exceeded());
        ledger.record(1, 0);
        assert!(ledger.reserve_exceeded());
    }

    #[test]
    fn monotonicity_across_steps() {
        let ledger = TokenLedger::new(1_000_000, 0.15);
        let mut prev = ledger.total();
        for _ in 0..5 {
            ledger.record(100, 50);
            let now = ledger.total();
            assert!(now >= prev);
            prev = now;
        }
    }
}
