//! Standard MIDI file reading into time-stamped raw events.

use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::RawEvent;
use crate::error::ReferenceError;

/// Microseconds per quarter note until the first tempo event.
const DEFAULT_TEMPO: u64 = 500_000;

pub fn read_midi(path: &Path) -> Result<Vec<RawEvent>, ReferenceError> {
    let bytes = std::fs::read(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_midi(&bytes)
}

/// Note messages of every track, merged and ordered by absolute time.
///
/// Events too late to be stamped in signed microseconds are dropped with a
/// warning.
pub fn parse_midi(bytes: &[u8]) -> Result<Vec<RawEvent>, ReferenceError> {
    let smf = Smf::parse(bytes)?;
    let clock = TickClock::new(&smf)?;

    let mut events = Vec::new();
    let mut out_of_range = 0usize;
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += event.delta.as_int() as u64;
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let (status, key, vel) = match message {
                MidiMessage::NoteOn { key, vel } => (0x90, key, vel),
                MidiMessage::NoteOff { key, vel } => (0x80, key, vel),
                _ => continue,
            };
            let Some(time_us) = clock.micros(tick) else {
                out_of_range += 1;
                continue;
            };
            events.push(RawEvent {
                time_us,
                status: status | channel.as_int(),
                data1: key.as_int(),
                data2: vel.as_int(),
            });
        }
    }
    events.sort_by_key(|e| e.time_us);

    if out_of_range > 0 {
        log::warn!("Dropped {} MIDI note events beyond the representable time range", out_of_range);
    }
    log::debug!(
        "MIDI: {} tracks, {} note events, {:?}",
        smf.tracks.len(),
        events.len(),
        smf.header.timing
    );
    Ok(events)
}

/// Tick to microsecond conversion, honouring tempo changes.
enum TickClock {
    Metrical {
        ppq: u64,
        /// `(tick, micros at tick, tempo from tick on)`, ascending.
        segments: Vec<(u64, i64, u64)>,
    },
    Timecode {
        micros_per_tick: f64,
    },
}

impl TickClock {
    fn new(smf: &Smf) -> Result<Self, ReferenceError> {
        match smf.header.timing {
            Timing::Metrical(ppq) => {
                let ppq = ppq.as_int() as u64;
                if ppq == 0 {
                    return Err(ReferenceError::UnsupportedTiming(
                        "zero ticks per quarter note".to_string(),
                    ));
                }
                let mut changes = Vec::new();
                for track in &smf.tracks {
                    let mut tick: u64 = 0;
                    for event in track {
                        tick += event.delta.as_int() as u64;
                        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                            changes.push((tick, tempo.as_int() as u64));
                        }
                    }
                }
                changes.sort_by_key(|&(tick, _)| tick);

                let mut segments = vec![(0u64, 0i64, DEFAULT_TEMPO)];
                for (tick, tempo) in changes {
                    let &(start, micros, current) = segments.last().unwrap_or(&(0, 0, DEFAULT_TEMPO));
                    // later tempo changes cannot affect any representable event
                    let Some(at) = advance(micros, tick - start, current, ppq) else {
                        break;
                    };
                    if tick == start {
                        segments.pop();
                    }
                    segments.push((tick, at, tempo));
                }
                Ok(TickClock::Metrical { ppq, segments })
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes as f64;
                if ticks_per_second <= 0.0 {
                    return Err(ReferenceError::UnsupportedTiming(format!(
                        "timecode {:?} with {} subframes",
                        fps, subframes
                    )));
                }
                Ok(TickClock::Timecode {
                    micros_per_tick: 1_000_000.0 / ticks_per_second,
                })
            }
        }
    }

    /// Microseconds at `tick`, or `None` past `i64::MAX`.
    fn micros(&self, tick: u64) -> Option<i64> {
        match self {
            TickClock::Metrical { ppq, segments } => {
                let i = segments.partition_point(|&(start, _, _)| start <= tick);
                let (start, micros, tempo) = segments[i.saturating_sub(1)];
                advance(micros, tick - start, tempo, *ppq)
            }
            TickClock::Timecode { micros_per_tick } => {
                let micros = (tick as f64 * micros_per_tick).round();
                (micros.is_finite() && micros < i64::MAX as f64).then_some(micros as i64)
            }
        }
    }
}

/// `micros + ticks * tempo / ppq`, or `None` past `i64::MAX`.
fn advance(micros: i64, ticks: u64, tempo: u64, ppq: u64) -> Option<i64> {
    let elapsed = ticks as u128 * tempo as u128 / ppq as u128;
    i64::try_from(micros as u128 + elapsed).ok()
}
