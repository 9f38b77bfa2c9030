use std::collections::VecDeque;

use super::onset::{OnsetDetector, OnsetState};
use super::pitch::{self, CaptureState, PitchEstimator, PitchStrategy};
use super::{NoteEvent, NoteSink, DETECTED_VELOCITY};
use crate::audio::{AudioBlock, SpectralAnalyzer};
use crate::config::Config;
use crate::error::ConfigError;

/// Streaming audio-to-note transcription for one track.
///
/// Each block is analyzed once; the spectrum drives the onset detector and,
/// together with the raw block, the pitch estimator. An onset opens a capture
/// and the block that completes it emits at most one note-on, stamped with
/// that block's playback time. Emitted notes are released after the
/// configured hold, or earlier when the next note starts.
pub struct Transcriber {
    analyzer: SpectralAnalyzer,
    onset: OnsetDetector,
    pitch: Box<dyn PitchEstimator>,
    note_hold: f64,
    /// Note-offs ordered by time.
    pending_offs: VecDeque<NoteEvent>,
    stream_end: f64,
    blocks: u64,
    onsets: u64,
    emitted: u64,
}

impl Transcriber {
    pub fn new(config: &Config, sample_rate: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        let analyzer = SpectralAnalyzer::new(sample_rate, &config.analysis)?;
        let onset = OnsetDetector::new(&config.onset)?;
        let pitch = pitch::build(&config.pitch, &analyzer)?;
        log::debug!(
            "Transcriber: {}Hz, fft {} ({} bins), {:?} pitch",
            sample_rate,
            analyzer.fft_size(),
            analyzer.bins(),
            pitch.strategy()
        );
        Ok(Self {
            analyzer,
            onset,
            pitch,
            note_hold: config.output.note_hold_ms / 1000.0,
            pending_offs: VecDeque::new(),
            stream_end: 0.0,
            blocks: 0,
            onsets: 0,
            emitted: 0,
        })
    }

    pub fn strategy(&self) -> PitchStrategy {
        self.pitch.strategy()
    }

    pub fn onset_state(&self) -> OnsetState {
        self.onset.state()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.pitch.capture_state()
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    pub fn onsets(&self) -> u64 {
        self.onsets
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Runs one processing step. Returns the note-on emitted during it, if any.
    pub fn process(&mut self, block: &AudioBlock, sink: &mut impl NoteSink) -> Option<NoteEvent> {
        self.blocks += 1;
        self.stream_end = self.stream_end.max(block.time + block.duration());
        self.release_due(block.time, sink);

        let spectrum = self.analyzer.analyze(block);
        if self.onset.process(&spectrum, block.energy()) {
            self.onsets += 1;
            if !self.pitch.start_capture() {
                log::trace!("Onset at {:.3}s while capture busy", block.time);
            }
        }

        self.pitch.feed(block, &spectrum);

        let estimate = self.pitch.take_result()?;
        let note = match (estimate.voiced, estimate.note) {
            (true, Some(note)) => note,
            _ => {
                log::trace!("Unvoiced estimate at {:.3}s", block.time);
                return None;
            }
        };

        // monophonic: whatever is still sounding ends here
        self.release_all(block.time, sink);

        let event = NoteEvent {
            note,
            velocity: DETECTED_VELOCITY,
            time: block.time,
        };
        sink.note_on(&event);
        self.pending_offs.push_back(NoteEvent {
            velocity: 0,
            time: block.time + self.note_hold,
            ..event
        });
        self.emitted += 1;
        log::debug!("Note {} at {:.3}s ({:.1}Hz)", note, block.time, estimate.frequency);
        Some(event)
    }

    /// End of stream: abandons any capture in flight and releases every
    /// sounding note no later than the end of the last block.
    pub fn finish(&mut self, sink: &mut impl NoteSink) {
        if self.pitch.capture_state() != CaptureState::Idle {
            log::debug!("Abandoning unfinished capture at end of stream");
        }
        self.pitch.abandon();
        while let Some(mut off) = self.pending_offs.pop_front() {
            off.time = off.time.min(self.stream_end);
            sink.note_off(&off);
        }
    }

    fn release_due(&mut self, now: f64, sink: &mut impl NoteSink) {
        while self.pending_offs.front().is_some_and(|off| off.time <= now) {
            if let Some(off) = self.pending_offs.pop_front() {
                sink.note_off(&off);
            }
        }
    }

    fn release_all(&mut self, now: f64, sink: &mut impl NoteSink) {
        while let Some(mut off) = self.pending_offs.pop_front() {
            off.time = off.time.min(now);
            sink.note_off(&off);
        }
    }
}
