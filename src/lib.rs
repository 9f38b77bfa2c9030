//! Monophonic audio-to-note transcription graded against reference MIDI.
//!
//! Audio is streamed in fixed-size blocks through a spectral analyzer, a
//! three-band onset detector and an onset-triggered pitch estimator (YIN or
//! harmonic product spectrum). Emitted notes are scored against a
//! millisecond-bucketed reference index built from a MIDI file.

pub mod audio;
pub mod config;
pub mod detect;
pub mod error;
pub mod reference;
pub mod score;
pub mod track;
