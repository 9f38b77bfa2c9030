use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{NoteEvent, NoteSink};
use crate::error::ConfigError;
use crate::reference::ReferenceIndex;

/// Baseline detector that plays the reference back instead of listening.
///
/// Every millisecond bucket holding note-ons is replayed, as a whole, with
/// probability `p` once playback reaches it. The notes are reported at the
/// playback time that reached the bucket. With `p = 1` the scorer sees a
/// perfect transcription delayed by at most one block.
pub struct ReferenceReplay {
    buckets: Vec<(u64, Vec<(u8, u8)>)>,
    cursor: usize,
    probability: f64,
    rng: StdRng,
}

impl ReferenceReplay {
    pub fn new(index: &ReferenceIndex, probability: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::out_of_range("probability", "within [0, 1]", probability));
        }
        let buckets = index
            .buckets()
            .filter_map(|(ms, events)| {
                let notes: Vec<(u8, u8)> = events
                    .iter()
                    .filter(|e| e.is_sounding_on())
                    .map(|e| (e.note, e.velocity))
                    .collect();
                (!notes.is_empty()).then_some((ms, notes))
            })
            .collect();
        Ok(Self {
            buckets,
            cursor: 0,
            probability,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Replays buckets up to `time` seconds. Returns the number of notes sent.
    pub fn advance_to(&mut self, time: f64, sink: &mut impl NoteSink) -> usize {
        if !(time.is_finite() && time >= 0.0) {
            return 0;
        }
        let limit = (time * 1000.0).floor() as u64;
        let mut sent = 0;
        while let Some((ms, notes)) = self.buckets.get(self.cursor) {
            if *ms > limit {
                break;
            }
            self.cursor += 1;
            if !self.rng.gen_bool(self.probability) {
                continue;
            }
            for &(note, velocity) in notes {
                sink.note_on(&NoteEvent {
                    note,
                    velocity,
                    time,
                });
                sent += 1;
            }
        }
        sent
    }

    pub fn remaining(&self) -> usize {
        self.buckets.len() - self.cursor
    }
}
