use std::fmt::Write;

use super::{Grade, LatencyStats, MatchPolicy, Scorer};

/// Final figures for one track.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackScore {
    pub duration: f64,
    pub reference_notes: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub redundant: u64,
    /// Present only for policies that measure latency.
    pub latency: Option<LatencyStats>,
    pub grade: Grade,
}

impl TrackScore {
    pub fn from_scorer(scorer: &Scorer, duration: f64) -> Self {
        let acc = scorer.accumulator();
        Self {
            duration,
            reference_notes: acc.reference_notes,
            true_positives: acc.true_positives,
            false_positives: acc.false_positives,
            redundant: acc.redundant,
            latency: scorer.policy().reports_latency().then_some(acc.latency),
            grade: scorer.grade(),
        }
    }
}

/// One line of the batch report.
#[derive(Clone, Debug)]
pub struct ReportRow {
    pub file: String,
    pub outcome: Result<TrackScore, String>,
}

impl ReportRow {
    pub fn scored(file: impl Into<String>, score: TrackScore) -> Self {
        Self {
            file: file.into(),
            outcome: Ok(score),
        }
    }

    pub fn failed(file: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            file: file.into(),
            outcome: Err(format!("{:#}", error)),
        }
    }

    /// Tab-separated line matching [`header`] for `policy`.
    pub fn to_line(&self, policy: MatchPolicy) -> String {
        let mut line = self.file.clone();
        let score = match &self.outcome {
            Ok(score) => score,
            Err(message) => {
                let _ = write!(line, "\tERROR: {}", message);
                return line;
            }
        };
        let _ = write!(
            line,
            "\t{:.1}\t{}\t{}\t{}",
            score.duration, score.reference_notes, score.true_positives, score.false_positives
        );
        if policy.reports_latency() {
            let stats = score.latency.unwrap_or_default();
            for value in [stats.min(), stats.max(), stats.mean()] {
                match value {
                    Some(seconds) => {
                        let _ = write!(line, "\t{:.1}", seconds * 1000.0);
                    }
                    None => line.push_str("\t-"),
                }
            }
        }
        let _ = write!(line, "\t{}", score.grade);
        line
    }
}

pub fn header(policy: MatchPolicy) -> String {
    let mut columns = vec!["File", "Track length (s)", "Reference notes", "True detections", "False detections"];
    if policy.reports_latency() {
        columns.extend(["Min latency (ms)", "Max latency (ms)", "Avg latency (ms)"]);
    }
    columns.push("Grade");
    columns.join("\t")
}

/// Mean grade over rows with a defined grade.
pub fn mean_grade(rows: &[ReportRow]) -> Option<f64> {
    let grades: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.outcome.as_ref().ok())
        .filter_map(|score| score.grade.value())
        .collect();
    (!grades.is_empty()).then(|| grades.iter().sum::<f64>() / grades.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(latency: Option<LatencyStats>, grade: Grade) -> TrackScore {
        TrackScore {
            duration: 12.34,
            reference_notes: 2,
            true_positives: 1,
            false_positives: 1,
            redundant: 0,
            latency,
            grade,
        }
    }

    #[test]
    fn latency_columns_follow_policy() {
        assert_eq!(header(MatchPolicy::LatencyWindow).split('\t').count(), 9);
        assert_eq!(header(MatchPolicy::VelocityState).split('\t').count(), 6);
    }

    #[test]
    fn formats_latency_row() {
        let mut stats = LatencyStats::default();
        stats.record(0.010);
        stats.record(0.030);
        let row = ReportRow::scored("a.wav", score(Some(stats), Grade::Score(2.25)));
        assert_eq!(
            row.to_line(MatchPolicy::LatencyWindow),
            "a.wav\t12.3\t2\t1\t1\t10.0\t30.0\t20.0\t2.25"
        );
    }

    #[test]
    fn formats_row_without_matches() {
        let row = ReportRow::scored("b.wav", score(Some(LatencyStats::default()), Grade::Undefined));
        assert_eq!(
            row.to_line(MatchPolicy::LatencyWindow),
            "b.wav\t12.3\t2\t1\t1\t-\t-\t-\tundefined"
        );
        let row = ReportRow::scored("b.wav", score(None, Grade::Score(1.0)));
        assert_eq!(row.to_line(MatchPolicy::VelocityState), "b.wav\t12.3\t2\t1\t1\t1.00");
    }

    #[test]
    fn error_rows_keep_the_file_name() {
        let err = anyhow::anyhow!("no reference").context("loading c.mid");
        let row = ReportRow::failed("c.wav", &err);
        assert_eq!(row.to_line(MatchPolicy::LatencyWindow), "c.wav\tERROR: loading c.mid: no reference");
    }

    #[test]
    fn mean_grade_skips_failures_and_undefined() {
        let rows = vec![
            ReportRow::scored("a", score(None, Grade::Score(2.0))),
            ReportRow::scored("b", score(None, Grade::Score(4.0))),
            ReportRow::scored("c", score(None, Grade::Undefined)),
            ReportRow::failed("d", &anyhow::anyhow!("boom")),
        ];
        assert_eq!(mean_grade(&rows), Some(3.0));
        assert_eq!(mean_grade(&[]), None);
    }
}
