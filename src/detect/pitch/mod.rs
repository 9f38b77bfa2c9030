//! Onset-triggered pitch estimation.
//!
//! Both strategies share the same cycle: the onset detector calls
//! [`PitchEstimator::start_capture`], every processing step then feeds the
//! current block, and once the capture buffer is full a single
//! [`PitchEstimate`] becomes available until it is cleared. Starting a capture
//! while one is running or while a result is pending is a no-op.

pub mod capture;
pub mod hps;
pub mod yin;

use serde::Deserialize;

use crate::audio::{AudioBlock, SpectralAnalyzer, Spectrum};
use crate::config::PitchConfig;
use crate::detect::note;
use crate::error::ConfigError;

pub use capture::{Capture, CaptureState};
pub use hps::HpsEstimator;
pub use yin::YinEstimator;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PitchStrategy {
    /// Time-domain cumulative-mean-normalized difference (YIN)
    #[default]
    Yin,
    /// Harmonic product spectrum over captured power spectra
    Hps,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental in Hz, 0.0 when nothing was found.
    pub frequency: f32,
    pub voiced: bool,
    /// Power at the detected peak (HPS only).
    pub amplitude: Option<f32>,
    /// Quantized note; always `Some` for voiced estimates.
    pub note: Option<u8>,
}

impl PitchEstimate {
    pub fn unvoiced() -> Self {
        Self {
            frequency: 0.0,
            voiced: false,
            amplitude: None,
            note: None,
        }
    }

    /// Voiced estimate for `frequency`, or unvoiced if it does not quantize to
    /// a note in 0..=127.
    pub fn from_frequency(frequency: f32, amplitude: Option<f32>) -> Self {
        match note::quantize(frequency) {
            Some(n) => Self {
                frequency,
                voiced: true,
                amplitude,
                note: Some(n),
            },
            None => Self {
                frequency: if frequency.is_finite() { frequency } else { 0.0 },
                voiced: false,
                amplitude,
                note: None,
            },
        }
    }
}

pub trait PitchEstimator {
    fn strategy(&self) -> PitchStrategy;

    /// Begin accumulating. Returns `false` (and changes nothing) unless idle.
    fn start_capture(&mut self) -> bool;

    /// Called once per processing step with the current block and its spectrum.
    fn feed(&mut self, block: &AudioBlock, spectrum: &Spectrum);

    fn result(&self) -> Option<&PitchEstimate>;

    /// Drops the pending result and returns to idle.
    fn clear_result(&mut self);

    /// Discards an in-flight capture without producing a result.
    fn abandon(&mut self);

    fn capture_state(&self) -> CaptureState;

    /// Number of capture buffers filled so far.
    fn completed_captures(&self) -> u64;

    /// Takes the pending result, if any, and returns to idle.
    fn take_result(&mut self) -> Option<PitchEstimate> {
        let result = self.result().cloned();
        if result.is_some() {
            self.clear_result();
        }
        result
    }
}

/// Builds the configured strategy for a track analyzed by `analyzer`.
pub fn build(
    config: &PitchConfig,
    analyzer: &SpectralAnalyzer,
) -> Result<Box<dyn PitchEstimator>, ConfigError> {
    config.validate()?;
    Ok(match config.strategy {
        PitchStrategy::Yin => Box::new(YinEstimator::new(config, analyzer.sample_rate())?),
        PitchStrategy::Hps => Box::new(HpsEstimator::new(config, analyzer.bins())?),
    })
}

#[cfg(test)]
pub(crate) mod test_signal {
    use std::f32::consts::PI;

    /// Sum of harmonics of `f0` with amplitudes `amps[k]` for harmonic `k + 1`.
    pub fn harmonic_tone(f0: f32, amps: &[f32], sample_rate: u32, start: usize, len: usize) -> Vec<f32> {
        (start..start + len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amps.iter()
                    .enumerate()
                    .map(|(k, a)| a * (2.0 * PI * f0 * (k + 1) as f32 * t).sin())
                    .sum()
            })
            .collect()
    }

    pub fn sine(freq: f32, amplitude: f32, sample_rate: u32, start: usize, len: usize) -> Vec<f32> {
        harmonic_tone(freq, &[amplitude], sample_rate, start, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[test]
    fn builds_configured_strategy() {
        let analyzer = SpectralAnalyzer::new(44100, &AnalysisConfig::default()).unwrap();
        let mut config = PitchConfig::default();
        assert_eq!(build(&config, &analyzer).unwrap().strategy(), PitchStrategy::Yin);
        config.strategy = PitchStrategy::Hps;
        assert_eq!(build(&config, &analyzer).unwrap().strategy(), PitchStrategy::Hps);
    }

    #[test]
    fn build_fails_fast_on_bad_config() {
        let analyzer = SpectralAnalyzer::new(44100, &AnalysisConfig::default()).unwrap();
        let config = PitchConfig {
            hps_harmonics: 0,
            ..PitchConfig::default()
        };
        assert!(build(&config, &analyzer).is_err());
    }

    #[test]
    fn out_of_range_frequency_is_unvoiced() {
        let estimate = PitchEstimate::from_frequency(f32::INFINITY, None);
        assert!(!estimate.voiced);
        assert_eq!(estimate.frequency, 0.0);
        assert_eq!(estimate.note, None);

        let a4 = PitchEstimate::from_frequency(440.0, Some(1.0));
        assert!(a4.voiced);
        assert_eq!(a4.note, Some(69));
    }
}
