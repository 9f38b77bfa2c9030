use std::collections::btree_map::{BTreeMap, Range};
use std::ops::RangeInclusive;

use super::{EventKind, RawEvent, ReferenceEvent, ReferenceNote};

/// Reference events grouped by millisecond bucket.
///
/// Within a bucket events keep their time order, and the source order for
/// ties.
#[derive(Clone, Debug, Default)]
pub struct ReferenceIndex {
    buckets: BTreeMap<u64, Vec<ReferenceEvent>>,
    events: usize,
    note_ons: usize,
    skipped: usize,
}

impl ReferenceIndex {
    pub fn from_events(events: impl IntoIterator<Item = ReferenceEvent>) -> Self {
        let mut events: Vec<ReferenceEvent> = events.into_iter().collect();
        events.sort_by_key(|e| e.time_us);

        let mut index = Self::default();
        for event in events {
            index.events += 1;
            if event.is_sounding_on() {
                index.note_ons += 1;
            }
            index.buckets.entry(event.bucket()).or_default().push(event);
        }
        index
    }

    /// Validates raw reader output. Malformed note events are logged and
    /// skipped; non-note messages are dropped silently.
    pub fn from_raw(raw: impl IntoIterator<Item = RawEvent>) -> Self {
        let mut skipped = 0;
        let events: Vec<ReferenceEvent> = raw
            .into_iter()
            .filter_map(|event| match event.to_reference() {
                Ok(event) => event,
                Err(reason) => {
                    log::warn!("Skipping reference event {:?}: {}", event, reason);
                    skipped += 1;
                    None
                }
            })
            .collect();
        let mut index = Self::from_events(events);
        index.skipped = skipped;
        index
    }

    /// Sounding note-ons in the whole track.
    pub fn note_on_count(&self) -> usize {
        self.note_ons
    }

    pub fn event_count(&self) -> usize {
        self.events
    }

    /// Malformed events dropped while building.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    /// Time of the last event in seconds.
    pub fn end_time(&self) -> f64 {
        self.buckets
            .values()
            .next_back()
            .and_then(|events| events.last())
            .map_or(0.0, ReferenceEvent::time_secs)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (u64, &[ReferenceEvent])> {
        self.buckets.iter().map(|(&ms, events)| (ms, events.as_slice()))
    }

    pub fn range(&self, ms: RangeInclusive<u64>) -> Range<'_, u64, Vec<ReferenceEvent>> {
        self.buckets.range(ms)
    }

    pub fn events(&self) -> impl Iterator<Item = &ReferenceEvent> {
        self.buckets.values().flatten()
    }

    /// Latest sounding note-on of `note` in a bucket at or before the bucket
    /// of `time`, and no more than `window` seconds earlier. A note-on later
    /// than `time` within the same millisecond still counts.
    pub fn nearest_note_on(&self, note: u8, time: f64, window: f64) -> Option<&ReferenceEvent> {
        if !(time.is_finite() && time >= 0.0) {
            return None;
        }
        let from = ((time - window).max(0.0) * 1000.0).floor() as u64;
        let to = (time * 1000.0).floor() as u64;
        self.buckets
            .range(from..=to)
            .rev()
            .flat_map(|(_, events)| events.iter().rev())
            .filter(|e| e.note == note && e.is_sounding_on())
            .map(|e| (e, time - e.time_secs()))
            .find(|&(_, latency)| latency <= window + 1e-9)
            .map(|(e, _)| e)
    }

    /// Pairs each note-on with the next note-off of the same note.
    pub fn notes(&self) -> Vec<ReferenceNote> {
        let mut sounding: [Option<usize>; 128] = [None; 128];
        let mut notes: Vec<ReferenceNote> = Vec::with_capacity(self.note_ons);
        for event in self.events() {
            let slot = &mut sounding[event.note as usize];
            match event.kind {
                EventKind::NoteOn if event.velocity > 0 => {
                    // retrigger ends the previous span
                    if let Some(open) = slot.take() {
                        notes[open].off_time = Some(event.time_secs());
                    }
                    *slot = Some(notes.len());
                    notes.push(ReferenceNote {
                        note: event.note,
                        velocity: event.velocity,
                        on_time: event.time_secs(),
                        off_time: None,
                    });
                }
                _ => {
                    if let Some(open) = slot.take() {
                        notes[open].off_time = Some(event.time_secs());
                    }
                }
            }
        }
        notes
    }
}
