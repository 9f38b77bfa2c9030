use super::{EventKind, ReferenceIndex};

/// Per-note velocity of the reference track as of the current playback time.
///
/// Advancing replays every bucket up to the new time exactly once, so the
/// grid always reflects all events at or before it.
#[derive(Clone, Debug)]
pub struct VelocityGrid {
    velocities: [u8; 128],
    /// First bucket not yet replayed.
    next_ms: u64,
}

impl Default for VelocityGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityGrid {
    pub fn new() -> Self {
        Self {
            velocities: [0; 128],
            next_ms: 0,
        }
    }

    /// Replays the buckets of `index` up to `time` seconds. `on_change` sees
    /// every applied event as `(note, velocity)`. Going backwards is a no-op.
    pub fn advance_to(
        &mut self,
        index: &ReferenceIndex,
        time: f64,
        mut on_change: impl FnMut(u8, u8),
    ) {
        if !(time.is_finite() && time >= 0.0) {
            return;
        }
        let limit = (time * 1000.0).floor() as u64;
        if limit < self.next_ms {
            return;
        }
        for (_, events) in index.range(self.next_ms..=limit) {
            for event in events {
                let velocity = match event.kind {
                    EventKind::NoteOn => event.velocity,
                    EventKind::NoteOff => 0,
                };
                self.velocities[event.note as usize] = velocity;
                on_change(event.note, velocity);
            }
        }
        self.next_ms = limit + 1;
    }

    pub fn velocity(&self, note: u8) -> u8 {
        self.velocities[(note & 0x7F) as usize]
    }

    pub fn is_sounding(&self, note: u8) -> bool {
        self.velocity(note) > 0
    }

    pub fn velocities(&self) -> &[u8; 128] {
        &self.velocities
    }
}
