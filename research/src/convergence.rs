//! ConvergenceDetector - decides when novelty rate shows research has plateaued

use tracing::debug;

/// Rolling novelty-rate samples; `HasConverged` damps single-iteration spikes
/// by requiring the latest sample plus the mean of the last two to clear the
/// threshold (invariant 6: needs >= 2 prior samples).
#[derive(Default)]
pub struct ConvergenceDetector {
    samples: Vec<f64>,
}

impl ConvergenceDetector {
    pub fn new() -> Self {
        Self { samples: Vec::new() }
    }

    /// Records this iteration's novelty rate, computed by the caller as
    /// `new_knowledge_this_iteration / knowledge_before_iteration`, clamped to [0,1].
    pub fn record(&mut self, novelty_rate: f64) {
        let clamped = novelty_rate.clamp(0.0, 1.0);
        debug!(novelty_rate = clamped, "Recording novelty sample");
        self.samples.push(clamped);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// True iff at least 2 prior samples exist and the latest sample plus the
    /// mean of the last 2 (i.e. 3 most recent values total) stays <= threshold.
    pub fn has_converged(&self, threshold: f64) -> bool {
        if self.samples.len() < 3 {
            return false;
        }
        let n = self.samples.len();
        let latest = self.samples[n - 1];
        let last_two_mean = (self.samples[n - 2] + self.samples[n - 3]) / 2.0;
        latest + last_two_mean <= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_three_samples_never_converges() {
        let mut d = ConvergenceDetector::new();
        d.record(0.0);
        d.record(0.0);
        assert!(!d.has_converged(0.5));
    }

    #[test]
    fn single_zero_novelty_iteration_does_not_terminate_alone() {
        let mut d = ConvergenceDetector::new();
        d.record(0.8);
        d.record(0.8);
        d.record(0.0);
        // latest(0.0) + mean(0.8,0.8)=0.8 => 0.8, not <= 0.1
        assert!(!d.has_converged(0.1));
    }

    #[test]
    fn sustained_low_novelty_converges() {
        let mut d = ConvergenceDetector::new();
        d.record(0.05);
        d.record(0.05);
        d.record(0.05);
        // latest 0.05 + mean(0.05,0.05)=0.05 => 0.1 <= 0.2
        assert!(d.has_converged(0.2));
    }

    #[test]
    fn novelty_rate_is_clamped() {
        let mut d = ConvergenceDetector::new();
        d.record(1.5);
        d.record(-0.2);
        d.record(0.0);
        assert!(d.has_converged(2.0));
    }
}
