/// Running latency summary over true positives, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencyStats {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl LatencyStats {
    /// Negative latencies are clamped to zero; non-finite ones are dropped.
    pub fn record(&mut self, latency: f64) {
        if !latency.is_finite() {
            return;
        }
        let latency = latency.max(0.0);
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
        self.sum += latency;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_summary() {
        let stats = LatencyStats::default();
        assert!(stats.is_empty());
        assert_eq!(stats.min(), None);
        assert_eq!(stats.max(), None);
        assert_eq!(stats.mean(), None);
    }

    #[test]
    fn summarizes_recorded_values() {
        let mut stats = LatencyStats::default();
        for l in [0.01, 0.03, 0.02] {
            stats.record(l);
        }
        stats.record(f64::NAN);
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.min(), Some(0.01));
        assert_eq!(stats.max(), Some(0.03));
        assert!((stats.mean().unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn negative_latency_clamps_to_zero() {
        let mut stats = LatencyStats::default();
        stats.record(-0.004);
        assert_eq!(stats.min(), Some(0.0));
    }
}
