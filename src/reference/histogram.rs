use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

use super::{midi, ReferenceIndex};

/// Files skipped by [`scan`]; they are test fixtures covering every key.
pub const EXCLUDED_FILES: &[&str] = &["scale.mid"];

/// Note-on counts per key across a set of reference files.
#[derive(Clone, Debug)]
pub struct KeyHistogram {
    counts: [u64; 128],
    files: usize,
}

impl Default for KeyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHistogram {
    pub fn new() -> Self {
        Self {
            counts: [0; 128],
            files: 0,
        }
    }

    pub fn add_index(&mut self, index: &ReferenceIndex) {
        for event in index.events().filter(|e| e.is_sounding_on()) {
            self.counts[event.note as usize] += 1;
        }
        self.files += 1;
    }

    pub fn count(&self, note: u8) -> u64 {
        self.counts[(note & 0x7F) as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn files(&self) -> usize {
        self.files
    }

    /// Keys with at least one note-on, ascending.
    pub fn used_keys(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(note, &c)| (note as u8, c))
    }
}

impl fmt::Display for KeyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Key\tCount")?;
        for (note, count) in self.used_keys() {
            writeln!(f, "{}\t{}", note, count)?;
        }
        Ok(())
    }
}

pub fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
        .unwrap_or(false)
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| EXCLUDED_FILES.iter().any(|x| x.eq_ignore_ascii_case(n)))
        .unwrap_or(false)
}

/// Adds every MIDI file under `dir` to `histogram`, recursing into
/// subdirectories. Files that fail to parse are logged and skipped.
/// Returns the number of files added.
pub fn scan(dir: &Path, histogram: &mut KeyHistogram) -> Result<usize> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut added = 0;
    for path in entries {
        if path.is_dir() {
            added += scan(&path, histogram)?;
            continue;
        }
        if !is_midi_file(&path) || is_excluded(&path) {
            continue;
        }
        match midi::read_midi(&path) {
            Ok(raw) => {
                histogram.add_index(&ReferenceIndex::from_raw(raw));
                added += 1;
            }
            Err(err) => log::warn!("Skipping {}: {}", path.display(), err),
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceEvent;
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    fn write_midi(path: &Path, keys: &[u8]) {
        let mut track: Vec<TrackEvent> = keys
            .iter()
            .map(|&k| TrackEvent {
                delta: u28::new(120),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOn { key: u7::new(k), vel: u7::new(100) },
                },
            })
            .collect();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))));
        smf.tracks.push(track);
        smf.save(path).unwrap();
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pcm2midi-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn counts_note_ons_only() {
        let index = ReferenceIndex::from_events([
            ReferenceEvent::note_on(0, 60, 100),
            ReferenceEvent::note_off(10_000, 60),
            ReferenceEvent::note_on(20_000, 60, 90),
            ReferenceEvent::note_on(30_000, 64, 90),
        ]);
        let mut histogram = KeyHistogram::new();
        histogram.add_index(&index);
        assert_eq!(histogram.count(60), 2);
        assert_eq!(histogram.count(64), 1);
        assert_eq!(histogram.total(), 3);
        assert_eq!(histogram.to_string(), "Key\tCount\n60\t2\n64\t1\n");
    }

    #[test]
    fn scan_skips_excluded_and_unreadable_files() {
        let dir = scratch_dir("histogram");
        write_midi(&dir.join("a.mid"), &[60, 62]);
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        write_midi(&dir.join("nested").join("b.MID"), &[60]);
        write_midi(&dir.join("scale.mid"), &[10, 20, 30]);
        std::fs::write(dir.join("broken.mid"), b"nope").unwrap();
        std::fs::write(dir.join("notes.txt"), b"60").unwrap();

        let mut histogram = KeyHistogram::new();
        let added = scan(&dir, &mut histogram).unwrap();
        assert_eq!(added, 2);
        assert_eq!(histogram.files(), 2);
        assert_eq!(histogram.count(60), 2);
        assert_eq!(histogram.count(62), 1);
        assert_eq!(histogram.count(10), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn scan_accumulates_into_existing_histogram() {
        let dir = scratch_dir("histogram-acc");
        write_midi(&dir.join("a.mid"), &[70]);

        let mut histogram = KeyHistogram::new();
        scan(&dir, &mut histogram).unwrap();
        scan(&dir, &mut histogram).unwrap();
        assert_eq!(histogram.count(70), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
