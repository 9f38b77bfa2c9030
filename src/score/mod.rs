//! Grading emitted notes against a reference track.

pub mod latency;
pub mod report;
pub mod scorer;

use std::fmt;

use serde::Deserialize;

pub use latency::LatencyStats;
pub use report::{ReportRow, TrackScore};
pub use scorer::{Classification, ScoreAccumulator, Scorer};

/// How a detected note-on is matched against the reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Nearest earlier reference note-on within the latency window
    #[default]
    LatencyWindow,
    /// Whatever the reference velocity grid shows at detection time
    VelocityState,
}

impl MatchPolicy {
    /// Whether rows carry latency columns.
    pub fn reports_latency(self) -> bool {
        self == MatchPolicy::LatencyWindow
    }
}

/// Track grade on the 1..=6 scale, undefined without reference notes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Grade {
    Score(f64),
    Undefined,
}

impl Grade {
    /// `clamp(1 + 5 * (tp / total - weight * fp / total), 1, 6)`.
    pub fn compute(true_positives: u64, false_positives: u64, total: u64, weight: f64) -> Self {
        if total == 0 {
            return Grade::Undefined;
        }
        let total = total as f64;
        let ratio = true_positives as f64 / total - weight * false_positives as f64 / total;
        Grade::Score((1.0 + 5.0 * ratio).clamp(1.0, 6.0))
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Grade::Score(g) => Some(g),
            Grade::Undefined => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Score(g) => write!(f, "{:.2}", g),
            Grade::Undefined => f.write_str("undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_formula() {
        assert_eq!(Grade::compute(2, 1, 2, 0.5), Grade::Score(4.75));
        assert_eq!(Grade::compute(1, 1, 2, 0.5), Grade::Score(2.25));
        assert_eq!(Grade::compute(2, 0, 2, 0.5), Grade::Score(6.0));
    }

    #[test]
    fn grade_is_clamped() {
        assert_eq!(Grade::compute(0, 10, 2, 0.5), Grade::Score(1.0));
        assert_eq!(Grade::compute(5, 0, 2, 0.0), Grade::Score(6.0));
    }

    #[test]
    fn no_reference_notes_is_undefined() {
        let grade = Grade::compute(0, 3, 0, 0.5);
        assert_eq!(grade, Grade::Undefined);
        assert_eq!(grade.value(), None);
        assert_eq!(grade.to_string(), "undefined");
        assert_eq!(Grade::Score(2.25).to_string(), "2.25");
    }
}
