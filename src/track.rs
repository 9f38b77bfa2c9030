//! One track end to end: decode, load the reference, stream, score.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::audio::decode::{self, AudioData};
use crate::audio::BlockSource;
use crate::config::Config;
use crate::detect::{ReferenceReplay, Transcriber};
use crate::reference::{histogram, midi, ReferenceIndex};
use crate::score::{ReportRow, Scorer, TrackScore};

/// What produces the note-ons being graded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Detector {
    /// Onset-triggered pitch estimation with the configured strategy.
    Transcribe,
    /// Seeded random replay of the reference itself.
    Replay { probability: f64, seed: u64 },
}

/// Sibling `.mid` / `.midi` file sharing the audio file's stem.
pub fn find_reference(audio: &Path) -> Option<PathBuf> {
    ["mid", "midi", "MID", "MIDI"]
        .iter()
        .map(|ext| audio.with_extension(ext))
        .find(|p| p.is_file())
}

/// Audio files to grade: `path` itself, or every audio file below it, sorted.
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut inputs = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if decode::is_audio_file(&path) {
                inputs.push(path);
            }
        }
    }
    inputs.sort();
    Ok(inputs)
}

pub fn load_reference(path: &Path) -> Result<ReferenceIndex> {
    let raw = midi::read_midi(path)?;
    let index = ReferenceIndex::from_raw(raw);
    if index.skipped() > 0 {
        log::warn!(
            "{}: skipped {} malformed events",
            path.display(),
            index.skipped()
        );
    }
    Ok(index)
}

/// Streams `audio` block by block through `detector` and scores the result.
pub fn score_audio(
    audio: &AudioData,
    index: ReferenceIndex,
    config: &Config,
    detector: Detector,
) -> Result<TrackScore> {
    let mut scorer = Scorer::new(index, &config.scoring)?;
    let blocks = BlockSource::new(&audio.samples, audio.sample_rate, config.analysis.block_size);

    match detector {
        Detector::Transcribe => {
            let mut transcriber = Transcriber::new(config, audio.sample_rate)?;
            for block in blocks {
                scorer.advance_to(block.time);
                transcriber.process(&block, &mut scorer);
            }
            transcriber.finish(&mut scorer);
            log::debug!(
                "{} blocks, {} onsets, {} notes",
                transcriber.blocks(),
                transcriber.onsets(),
                transcriber.emitted()
            );
        }
        Detector::Replay { probability, seed } => {
            let mut replay = ReferenceReplay::new(scorer.index(), probability, seed)?;
            for block in blocks {
                scorer.advance_to(block.time);
                replay.advance_to(block.time, &mut scorer);
            }
        }
    }
    scorer.advance_to(audio.duration());

    Ok(TrackScore::from_scorer(&scorer, audio.duration()))
}

pub fn run_track(path: &Path, config: &Config, detector: Detector) -> Result<TrackScore> {
    let reference_path = find_reference(path)
        .with_context(|| format!("No reference MIDI next to {}", path.display()))?;
    let index = load_reference(&reference_path)
        .with_context(|| format!("Failed to load reference {}", reference_path.display()))?;

    let mut audio = decode::decode_audio(path)?;
    if config.analysis.auto_gain {
        audio.normalize_peak();
    }
    log::debug!(
        "{}: {:.1}s @ {}Hz, {} reference notes",
        path.display(),
        audio.duration(),
        audio.sample_rate,
        index.note_on_count()
    );

    score_audio(&audio, index, config, detector)
}

/// Like [`run_track`], but a failing track becomes an error row.
pub fn evaluate(path: &Path, config: &Config, detector: Detector) -> ReportRow {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match run_track(path, config, detector) {
        Ok(score) => {
            log::info!("{}: grade {}", name, score.grade);
            ReportRow::scored(name, score)
        }
        Err(err) => {
            log::error!("{}: {:#}", name, err);
            ReportRow::failed(name, &err)
        }
    }
}

/// Reference files under `dir` counted into `histogram`; see
/// [`histogram::scan`].
pub fn key_histogram(dir: &Path, histogram: &mut histogram::KeyHistogram) -> Result<usize> {
    histogram::scan(dir, histogram)
}
