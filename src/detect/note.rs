//! Equal-tempered note numbering: note 69 is A4 at 440 Hz, one unit per semitone.

pub const A4_NOTE: i32 = 69;
pub const A4_FREQUENCY: f32 = 440.0;
pub const NOTE_COUNT: usize = 128;

/// Nearest equal-tempered note for a voiced frequency.
///
/// Callers check voicing first: `freq` must be positive and finite.
pub fn frequency_to_note(freq: f32) -> i32 {
    (A4_NOTE as f32 + 12.0 * (freq / A4_FREQUENCY).log2()).round() as i32
}

/// Reference frequency of `note` in Hz.
pub fn note_to_frequency(note: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((note - A4_NOTE) as f32 / 12.0)
}

/// `frequency_to_note` restricted to the 0..=127 range; `None` for
/// non-positive, non-finite or out-of-range input.
pub fn quantize(freq: f32) -> Option<u8> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    let note = frequency_to_note(freq);
    u8::try_from(note).ok().filter(|&n| (n as usize) < NOTE_COUNT)
}

/// Ordered (note, frequency) table for nearest-note lookups.
#[derive(Clone, Debug)]
pub struct NoteTable {
    entries: Vec<(u8, f32)>,
}

impl NoteTable {
    /// Table over every note in 0..=127.
    pub fn equal_tempered() -> Self {
        Self::from_entries(
            (0..NOTE_COUNT as u8)
                .map(|n| (n, note_to_frequency(n as i32)))
                .collect(),
        )
    }

    /// Entries are sorted by frequency.
    pub fn from_entries(mut entries: Vec<(u8, f32)>) -> Self {
        entries.retain(|(_, f)| f.is_finite());
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry whose frequency is closest to `freq`; ties go to the lower note.
    pub fn nearest(&self, freq: f32) -> Option<(u8, f32)> {
        if self.entries.is_empty() || freq.is_nan() {
            return None;
        }
        let idx = self.entries.partition_point(|&(_, f)| f < freq);
        if idx == 0 {
            return Some(self.entries[0]);
        }
        if idx == self.entries.len() {
            return Some(self.entries[idx - 1]);
        }
        let lower = self.entries[idx - 1];
        let upper = self.entries[idx];
        if freq - lower.1 <= upper.1 - freq {
            Some(lower)
        } else {
            Some(upper)
        }
    }
}
