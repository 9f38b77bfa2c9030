//! Reference note sequences: loading, time-bucketed lookup and replay.

pub mod histogram;
pub mod index;
pub mod midi;
pub mod velocity;

pub use histogram::KeyHistogram;
pub use index::ReferenceIndex;
pub use velocity::VelocityGrid;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteOn,
    NoteOff,
}

/// A validated note event from the reference track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceEvent {
    /// Absolute time in microseconds.
    pub time_us: u64,
    pub kind: EventKind,
    pub note: u8,
    /// Zero for note-offs.
    pub velocity: u8,
}

impl ReferenceEvent {
    pub fn note_on(time_us: u64, note: u8, velocity: u8) -> Self {
        Self {
            time_us,
            kind: EventKind::NoteOn,
            note,
            velocity,
        }
    }

    pub fn note_off(time_us: u64, note: u8) -> Self {
        Self {
            time_us,
            kind: EventKind::NoteOff,
            note,
            velocity: 0,
        }
    }

    /// A note-on that actually sounds.
    pub fn is_sounding_on(&self) -> bool {
        self.kind == EventKind::NoteOn && self.velocity > 0
    }

    pub fn time_secs(&self) -> f64 {
        self.time_us as f64 / 1_000_000.0
    }

    /// Millisecond bucket this event falls into.
    pub fn bucket(&self) -> u64 {
        self.time_us / 1000
    }
}

/// A channel message as delivered by a MIDI reader, not yet validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub time_us: i64,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl RawEvent {
    /// `Ok(None)` for messages that are not note events; `Err` for note
    /// events that cannot be trusted.
    pub fn to_reference(&self) -> Result<Option<ReferenceEvent>, &'static str> {
        let kind = self.status & 0xF0;
        if kind != NOTE_ON && kind != NOTE_OFF {
            return Ok(None);
        }
        if self.time_us < 0 {
            return Err("negative timestamp");
        }
        if self.data1 > 127 {
            return Err("note number out of range");
        }
        if self.data2 > 127 {
            return Err("velocity out of range");
        }
        let time_us = self.time_us as u64;
        Ok(Some(if kind == NOTE_ON && self.data2 > 0 {
            ReferenceEvent::note_on(time_us, self.data1, self.data2)
        } else {
            // note-on with velocity 0 is a note-off
            ReferenceEvent::note_off(time_us, self.data1)
        }))
    }
}

/// A sounding span recovered by pairing note-ons with note-offs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceNote {
    pub note: u8,
    pub velocity: u8,
    pub on_time: f64,
    /// `None` when the track ends with the note still sounding.
    pub off_time: Option<f64>,
}
