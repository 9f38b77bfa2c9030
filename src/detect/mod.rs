pub mod note;
pub mod onset;
pub mod pipeline;
pub mod pitch;
pub mod replay;

pub use onset::{OnsetDetector, OnsetState};
pub use pipeline::Transcriber;
pub use replay::ReferenceReplay;

/// Velocity attached to every detected note-on.
pub const DETECTED_VELOCITY: u8 = 64;

/// A detected note at a playback time in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub note: u8,
    pub velocity: u8,
    pub time: f64,
}

/// Receives note-on / note-off callbacks from a detector.
pub trait NoteSink {
    fn note_on(&mut self, event: &NoteEvent);

    fn note_off(&mut self, _event: &NoteEvent) {}
}

/// Records note-ons.
impl NoteSink for Vec<NoteEvent> {
    fn note_on(&mut self, event: &NoteEvent) {
        self.push(*event);
    }
}

impl<S: NoteSink + ?Sized> NoteSink for &mut S {
    fn note_on(&mut self, event: &NoteEvent) {
        (**self).note_on(event);
    }

    fn note_off(&mut self, event: &NoteEvent) {
        (**self).note_off(event);
    }
}

impl<A: NoteSink, B: NoteSink> NoteSink for (A, B) {
    fn note_on(&mut self, event: &NoteEvent) {
        self.0.note_on(event);
        self.1.note_on(event);
    }

    fn note_off(&mut self, event: &NoteEvent) {
        self.0.note_off(event);
        self.1.note_off(event);
    }
}
