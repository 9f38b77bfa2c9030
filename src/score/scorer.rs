use std::collections::HashSet;

use super::{Grade, LatencyStats, MatchPolicy};
use crate::config::ScoringConfig;
use crate::detect::{NoteEvent, NoteSink};
use crate::error::ConfigError;
use crate::reference::{ReferenceIndex, VelocityGrid};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Classification {
    /// Latency is only measured by the latency-window policy.
    TruePositive { latency: Option<f64> },
    /// Matches a reference note that was already credited.
    Redundant,
    FalsePositive,
}

/// Running counts for one track.
#[derive(Clone, Debug, Default)]
pub struct ScoreAccumulator {
    pub reference_notes: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub redundant: u64,
    pub latency: LatencyStats,
}

/// Classifies every detected note-on of one track.
///
/// Callers advance the scorer to each block's playback time before feeding
/// that block's detections, which keeps the velocity grid in step with
/// playback.
pub struct Scorer {
    index: ReferenceIndex,
    grid: VelocityGrid,
    policy: MatchPolicy,
    max_latency: f64,
    false_positive_weight: f64,
    /// Reference note-ons already matched, by `(time_us, note)`.
    credited: HashSet<(u64, u8)>,
    /// Notes credited since their last reference note-off.
    detected: [bool; 128],
    accumulator: ScoreAccumulator,
}

impl Scorer {
    pub fn new(index: ReferenceIndex, config: &ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let accumulator = ScoreAccumulator {
            reference_notes: index.note_on_count() as u64,
            ..ScoreAccumulator::default()
        };
        Ok(Self {
            index,
            grid: VelocityGrid::new(),
            policy: config.policy,
            max_latency: config.max_latency_ms / 1000.0,
            false_positive_weight: config.false_positive_weight,
            credited: HashSet::new(),
            detected: [false; 128],
            accumulator,
        })
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn grid(&self) -> &VelocityGrid {
        &self.grid
    }

    pub fn accumulator(&self) -> &ScoreAccumulator {
        &self.accumulator
    }

    /// Replays reference events up to `time` seconds.
    pub fn advance_to(&mut self, time: f64) {
        let Self {
            index,
            grid,
            detected,
            ..
        } = self;
        grid.advance_to(index, time, |note, velocity| {
            if velocity == 0 {
                detected[note as usize] = false;
            }
        });
    }

    /// Classifies and counts one detected note-on.
    pub fn score(&mut self, event: &NoteEvent) -> Classification {
        self.advance_to(event.time);
        let class = match self.policy {
            MatchPolicy::LatencyWindow => self.match_latency_window(event),
            MatchPolicy::VelocityState => self.match_velocity_state(event),
        };

        let acc = &mut self.accumulator;
        match class {
            Classification::TruePositive { latency } => {
                acc.true_positives += 1;
                if let Some(latency) = latency {
                    acc.latency.record(latency);
                }
            }
            Classification::Redundant => acc.redundant += 1,
            Classification::FalsePositive => acc.false_positives += 1,
        }
        log::trace!("Note {} at {:.3}s: {:?}", event.note, event.time, class);
        class
    }

    fn match_latency_window(&mut self, event: &NoteEvent) -> Classification {
        let Some(reference) = self
            .index
            .nearest_note_on(event.note, event.time, self.max_latency)
        else {
            return Classification::FalsePositive;
        };
        let latency = (event.time - reference.time_secs()).max(0.0);
        if self.credited.insert((reference.time_us, reference.note)) {
            Classification::TruePositive {
                latency: Some(latency),
            }
        } else {
            Classification::Redundant
        }
    }

    fn match_velocity_state(&mut self, event: &NoteEvent) -> Classification {
        let note = (event.note & 0x7F) as usize;
        if !self.grid.is_sounding(event.note) {
            return Classification::FalsePositive;
        }
        if self.detected[note] {
            Classification::Redundant
        } else {
            self.detected[note] = true;
            Classification::TruePositive { latency: None }
        }
    }

    pub fn grade(&self) -> Grade {
        let acc = &self.accumulator;
        Grade::compute(
            acc.true_positives,
            acc.false_positives,
            acc.reference_notes,
            self.false_positive_weight,
        )
    }
}

impl NoteSink for Scorer {
    fn note_on(&mut self, event: &NoteEvent) {
        self.score(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ReferenceReplay;
    use crate::reference::ReferenceEvent;

    fn detection(note: u8, time: f64) -> NoteEvent {
        NoteEvent {
            note,
            velocity: 64,
            time,
        }
    }

    fn two_note_reference() -> ReferenceIndex {
        ReferenceIndex::from_events([
            ReferenceEvent::note_on(1_000_000, 60, 100),
            ReferenceEvent::note_off(1_400_000, 60),
            ReferenceEvent::note_on(2_000_000, 62, 100),
            ReferenceEvent::note_off(2_400_000, 62),
        ])
    }

    fn scorer(policy: MatchPolicy) -> Scorer {
        let config = ScoringConfig {
            policy,
            ..ScoringConfig::default()
        };
        Scorer::new(two_note_reference(), &config).unwrap()
    }

    #[test]
    fn one_hit_one_miss() {
        let mut s = scorer(MatchPolicy::LatencyWindow);
        assert_eq!(s.accumulator().reference_notes, 2);

        assert_eq!(
            s.score(&detection(60, 1.010)),
            Classification::TruePositive {
                latency: Some(1.010 - 1.0)
            }
        );
        assert_eq!(s.score(&detection(64, 2.05)), Classification::FalsePositive);

        let acc = s.accumulator();
        assert_eq!(acc.true_positives, 1);
        assert_eq!(acc.false_positives, 1);
        let grade = s.grade().value().unwrap();
        assert!(grade > 1.0 && grade < 6.0);
        assert!((grade - 2.25).abs() < 1e-12);
        assert!((acc.latency.mean().unwrap() - 0.010).abs() < 1e-9);
    }

    #[test]
    fn late_detection_is_false_positive() {
        let mut s = scorer(MatchPolicy::LatencyWindow);
        assert_eq!(s.score(&detection(60, 1.150)), Classification::FalsePositive);
        assert!(s.accumulator().latency.is_empty());
        assert_eq!(s.accumulator().latency.min(), None);
    }

    #[test]
    fn detection_inside_reference_millisecond_has_zero_latency() {
        let index = ReferenceIndex::from_events([ReferenceEvent::note_on(500_400, 60, 100)]);
        let mut s = Scorer::new(index, &ScoringConfig::default()).unwrap();
        assert_eq!(
            s.score(&detection(60, 0.5002)),
            Classification::TruePositive { latency: Some(0.0) }
        );
        assert_eq!(s.grade(), Grade::Score(6.0));
    }

    #[test]
    fn certain_replay_at_block_cadence_grades_perfectly() {
        let block = 1024.0 / 44100.0;
        let index = ReferenceIndex::from_events((1..=200u64).flat_map(|k| {
            let on = (k as f64 * block * 1e6).round() as u64;
            let note = 48 + (k % 24) as u8;
            [
                ReferenceEvent::note_on(on, note, 100),
                ReferenceEvent::note_off(on + 10_000, note),
            ]
        }));
        let mut replay = ReferenceReplay::new(&index, 1.0, 3).unwrap();
        let mut s = Scorer::new(index, &ScoringConfig::default()).unwrap();
        for k in 0..=202u64 {
            let time = k as f64 * block;
            s.advance_to(time);
            replay.advance_to(time, &mut s);
        }
        let acc = s.accumulator();
        assert_eq!((acc.true_positives, acc.false_positives, acc.redundant), (200, 0, 0));
        assert_eq!(s.grade(), Grade::Score(6.0));
    }

    #[test]
    fn second_match_of_same_reference_note_is_redundant() {
        let mut s = scorer(MatchPolicy::LatencyWindow);
        s.score(&detection(60, 1.02));
        assert_eq!(s.score(&detection(60, 1.05)), Classification::Redundant);
        let acc = s.accumulator();
        assert_eq!((acc.true_positives, acc.redundant, acc.false_positives), (1, 1, 0));
    }

    #[test]
    fn latency_summary_is_ordered() {
        let mut s = scorer(MatchPolicy::LatencyWindow);
        s.score(&detection(60, 1.030));
        s.score(&detection(62, 2.070));
        let stats = s.accumulator().latency;
        let (min, mean, max) = (stats.min().unwrap(), stats.mean().unwrap(), stats.max().unwrap());
        assert!(min <= mean && mean <= max);
        assert!((min - 0.030).abs() < 1e-9);
        assert!((max - 0.070).abs() < 1e-9);
    }

    #[test]
    fn velocity_state_uses_sounding_notes() {
        let mut s = scorer(MatchPolicy::VelocityState);
        // long after the onset but the note is still held
        assert_eq!(
            s.score(&detection(60, 1.3)),
            Classification::TruePositive { latency: None }
        );
        assert_eq!(s.score(&detection(60, 1.35)), Classification::Redundant);
        // released
        assert_eq!(s.score(&detection(60, 1.5)), Classification::FalsePositive);
        assert_eq!(s.score(&detection(62, 2.1)), Classification::TruePositive { latency: None });
        assert!(s.accumulator().latency.is_empty());
        // tp 2, fp 1 over 2 reference notes
        assert_eq!(s.grade(), Grade::Score(4.75));
    }

    #[test]
    fn velocity_state_rearms_after_note_off() {
        let index = ReferenceIndex::from_events([
            ReferenceEvent::note_on(0, 60, 100),
            ReferenceEvent::note_off(500_000, 60),
            ReferenceEvent::note_on(600_000, 60, 100),
        ]);
        let config = ScoringConfig {
            policy: MatchPolicy::VelocityState,
            ..ScoringConfig::default()
        };
        let mut s = Scorer::new(index, &config).unwrap();
        s.score(&detection(60, 0.1));
        s.advance_to(0.55);
        assert!(!s.grid().is_sounding(60));
        assert_eq!(
            s.score(&detection(60, 0.65)),
            Classification::TruePositive { latency: None }
        );
        assert_eq!(s.accumulator().true_positives, 2);
    }

    #[test]
    fn empty_reference_grade_is_undefined() {
        let mut s = Scorer::new(ReferenceIndex::default(), &ScoringConfig::default()).unwrap();
        s.score(&detection(60, 0.5));
        assert_eq!(s.accumulator().false_positives, 1);
        assert_eq!(s.grade(), Grade::Undefined);
    }

    #[test]
    fn works_as_note_sink() {
        let mut s = scorer(MatchPolicy::LatencyWindow);
        let mut recorded: Vec<NoteEvent> = Vec::new();
        {
            let mut both = (&mut s, &mut recorded);
            both.note_on(&detection(60, 1.0));
        }
        assert_eq!(recorded.len(), 1);
        assert_eq!(s.accumulator().true_positives, 1);
    }
}
