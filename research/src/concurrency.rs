//! AdaptiveConcurrency - adjusts the active-request ceiling from
//! success/error rate and resource signals

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::events::{Event, EventEmitter};

/// A best-effort resource sample; implementations may return stale or
/// approximate readings. `None` fields are treated as "within limits".
pub trait ResourceSample: Send + Sync {
    fn cpu_percent(&self) -> Option<f64>;
    fn memory_percent(&self) -> Option<f64>;
}

/// Always reports no resource pressure; used when no sampler is configured.
pub struct NoopResourceSample;

impl ResourceSample for NoopResourceSample {
    fn cpu_percent(&self) -> Option<f64> {
        None
    }

    fn memory_percent(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct AdaptiveConcurrencyConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub cpu_limit: f64,
    pub memory_limit: f64,
    pub scale_down_threshold: f64,
    pub scale_up_threshold: f64,
    pub adjustment_interval: Duration,
}

impl Default for AdaptiveConcurrencyConfig {
    fn default() -> Self {
        Self {
            min_concurrency: 1,
            max_concurrency: 20,
            cpu_limit: 0.85,
            memory_limit: 0.85,
            scale_down_threshold: 0.3,
            scale_up_threshold: 0.9,
            adjustment_interval: Duration::from_secs(5),
        }
    }
}

/// Rolling success/error counters reset after every adjustment.
#[derive(Default)]
struct RollingRates {
    successes: AtomicUsize,
    errors: AtomicUsize,
}

impl RollingRates {
    fn record(&self, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drains the counters, returning `(success_rate, error_rate)`; both 0
    /// when no requests were recorded this window.
    fn take_rates(&self) -> (f64, f64) {
        let successes = self.successes.swap(0, Ordering::Relaxed) as f64;
        let errors = self.errors.swap(0, Ordering::Relaxed) as f64;
        let total = successes + errors;
        if total == 0.0 {
            (0.0, 0.0)
        } else {
            (successes / total, errors / total)
        }
    }
}

pub struct AdaptiveConcurrency {
    current: AtomicUsize,
    config: AdaptiveConcurrencyConfig,
    rates: RollingRates,
}

impl AdaptiveConcurrency {
    pub fn new(initial: usize, config: AdaptiveConcurrencyConfig) -> Self {
        let clamped = initial.clamp(config.min_concurrency, config.max_concurrency);
        debug!(initial = clamped, "Setting initial concurrency ceiling");
        Self { current: AtomicUsize::new(clamped), config, rates: RollingRates::default() }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn record_outcome(&self, success: bool) {
        self.rates.record(success);
    }

    /// Runs one adjustment pass and returns `Some((previous, current, reason))`
    /// if the ceiling changed. Call on `adjustment_interval` cadence.
    pub fn adjust(&self, sampler: &dyn ResourceSample) -> Option<(usize, usize, &'static str)> {
        let previous = self.current();
        let (success_rate, error_rate) = self.rates.take_rates();
        let cpu = sampler.cpu_percent().unwrap_or(0.0);
        let memory = sampler.memory_percent().unwrap_or(0.0);

        let (next, reason) = if cpu > self.config.cpu_limit || memory > self.config.memory_limit {
            (((previous as f64) * 0.7).floor() as usize, "resource-limit")
        } else if error_rate > self.config.scale_down_threshold {
            (previous.saturating_sub(1), "high-error-rate")
        } else if success_rate >= self.config.scale_up_threshold {
            (previous + 1, "high-success-rate")
        } else {
            (previous, "stable")
        };

        let clamped = next.clamp(self.config.min_concurrency, self.config.max_concurrency);
        if clamped == previous {
            return None;
        }
        self.current.store(clamped, Ordering::SeqCst);
        info!(previous, current = clamped, reason, "Concurrency ceiling changed");
        Some((previous, clamped, reason))
    }

    /// Convenience wrapper that also emits a `ConcurrencyChange` event on change.
    pub fn adjust_and_emit(&self, sampler: &dyn ResourceSample, run_id: &str, emitter: &EventEmitter) {
        if let Some((previous, current, reason)) = self.adjust(sampler) {
            emitter.emit(Event::ConcurrencyChange { run_id: run_id.to_string(), previous, current, reason: reason.to_string() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSample {
        cpu: Option<f64>,
        memory: Option<f64>,
    }

    impl ResourceSample for FixedSample {
        fn cpu_percent(&self) -> Option<f64> {
            self.cpu
        }

        fn memory_percent(&self) -> Option<f64> {
            self.memory
        }
    }

    #[test]
    fn initial_value_is_clamped_to_bounds() {
        let ac = AdaptiveConcurrency::new(100, AdaptiveConcurrencyConfig { max_concurrency: 20, ..Default::default() });
        assert_eq!(ac.current(), 20);
    }

    #[test]
    fn resource_pressure_shrinks_by_30_percent() {
        let ac = AdaptiveConcurrency::new(10, AdaptiveConcurrencyConfig::default());
        let sample = FixedSample { cpu: Some(0.95), memory: Some(0.1) };
        let change = ac.adjust(&sample);
        assert_eq!(change, Some((10, 7, "resource-limit")));
    }

    #[test]
    fn high_error_rate_decrements_by_one() {
        let ac = AdaptiveConcurrency::new(10, AdaptiveConcurrencyConfig::default());
        for _ in 0..4 {
            ac.record_outcome(false);
        }
        ac.record_outcome(true);
        let sample = FixedSample { cpu: None, memory: None };
        let change = ac.adjust(&sample);
        assert_eq!(change, Some((10, 9, "high-error-rate")));
    }

    #[test]
    fn high_success_rate_increments_by_one() {
        let ac = AdaptiveConcurrency::new(10, AdaptiveConcurrencyConfig::default());
        for _ in 0..10 {
            ac.record_outcome(true);
        }
        let sample = FixedSample { cpu: None, memory: None };
        let change = ac.adjust(&sample);
        assert_eq!(change, Some((10, 11, "high-success-rate")));
    }

    #[test]
    fn stable_rates_leave_ceiling_unchanged() {
        let ac = AdaptiveConcurrency::new(10, AdaptiveConcurrencyConfig::default());
        let sample = FixedSample { cpu: None, memory: None };
        assert_eq!(ac.adjust(&sample), None);
        assert_eq!(ac.current(), 10);
    }

    #[test]
    fn never_exceeds_max_or_drops_below_min() {
        let config = AdaptiveConcurrencyConfig { min_concurrency: 2, max_concurrency: 3, ..Default::default() };
        let ac = AdaptiveConcurrency::new(3, config);
        for _ in 0..10 {
            ac.record_outcome(true);
        }
        let sample = FixedSample { cpu: None, memory: None };
        assert_eq!(ac.adjust(&sample), None, "already at max, high success rate should not overshoot");
    }
}
