use super::{Capture, CaptureState, PitchEstimate, PitchEstimator, PitchStrategy};
use crate::audio::spectrum::bin_frequency;
use crate::audio::{AudioBlock, Spectrum};
use crate::config::PitchConfig;
use crate::error::ConfigError;

/// Harmonic product spectrum over several consecutive power spectra.
///
/// The capture buffer holds as many whole spectra as fit in
/// `hps_buffer_size` power values; once full they are averaged bin by bin
/// and the product spectrum is taken over the average.
pub struct HpsEstimator {
    capture: Capture,
    bins: usize,
    harmonics: usize,
    min_frequency: f32,
    min_amplitude: f32,
    result: Option<PitchEstimate>,
}

impl HpsEstimator {
    /// `bins` is the length of every spectrum that will be fed.
    pub fn new(config: &PitchConfig, bins: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        let frames = if bins == 0 { 0 } else { config.hps_buffer_size / bins };
        if frames == 0 {
            return Err(ConfigError::out_of_range(
                "pitch.hps_buffer_size",
                "at least one spectrum long",
                config.hps_buffer_size,
            ));
        }
        Ok(Self {
            capture: Capture::new(frames * bins),
            bins,
            harmonics: config.hps_harmonics,
            min_frequency: config.hps_min_frequency,
            min_amplitude: config.hps_min_amplitude,
            result: None,
        })
    }

    /// Spectra averaged per estimate.
    pub fn frames_per_capture(&self) -> usize {
        self.capture.capacity() / self.bins
    }
}

impl PitchEstimator for HpsEstimator {
    fn strategy(&self) -> PitchStrategy {
        PitchStrategy::Hps
    }

    fn start_capture(&mut self) -> bool {
        self.capture.start()
    }

    fn feed(&mut self, _block: &AudioBlock, spectrum: &Spectrum) {
        if self.capture.state() != CaptureState::Capturing {
            return;
        }
        if spectrum.len() != self.bins {
            log::warn!(
                "HPS: ignoring spectrum with {} bins (expected {})",
                spectrum.len(),
                self.bins
            );
            return;
        }
        let bins = self.bins;
        let (harmonics, min_frequency, min_amplitude) =
            (self.harmonics, self.min_frequency, self.min_amplitude);
        if let Some(buffer) = self.capture.push(&spectrum.power) {
            let averaged = average_frames(buffer, bins);
            let estimate = estimate_pitch(
                &averaged,
                harmonics,
                |bin| bin_frequency(bin, spectrum.sample_rate, spectrum.fft_size),
                min_frequency,
                min_amplitude,
            );
            log::debug!(
                "HPS: {:.2}Hz amp={:?} voiced={} note={:?}",
                estimate.frequency,
                estimate.amplitude,
                estimate.voiced,
                estimate.note
            );
            self.result = Some(estimate);
        }
    }

    fn result(&self) -> Option<&PitchEstimate> {
        self.result.as_ref()
    }

    fn clear_result(&mut self) {
        self.result = None;
        self.capture.reset();
    }

    fn abandon(&mut self) {
        self.clear_result();
    }

    fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    fn completed_captures(&self) -> u64 {
        self.capture.completed()
    }
}

fn average_frames(buffer: &[f32], bins: usize) -> Vec<f32> {
    let frames = buffer.len() / bins;
    let mut averaged = vec![0.0f32; bins];
    for frame in buffer.chunks_exact(bins) {
        for (acc, &p) in averaged.iter_mut().zip(frame) {
            *acc += p;
        }
    }
    for acc in &mut averaged {
        *acc /= frames as f32;
    }
    averaged
}

/// Pointwise product of the spectrum downsampled by 1..=harmonics, truncated
/// to the shortest downsampled length.
pub fn harmonic_product_spectrum(spectrum: &[f32], harmonics: usize) -> Vec<f64> {
    if spectrum.is_empty() || harmonics == 0 {
        return Vec::new();
    }
    let len = spectrum.len().div_ceil(harmonics);
    (0..len)
        .map(|i| {
            (1..=harmonics)
                .map(|h| spectrum[i * h] as f64)
                .product()
        })
        .collect()
}

/// Picks the strongest product bin above DC and applies the voicing gates.
pub fn estimate_pitch(
    spectrum: &[f32],
    harmonics: usize,
    bin_to_frequency: impl Fn(usize) -> f32,
    min_frequency: f32,
    min_amplitude: f32,
) -> PitchEstimate {
    let hps = harmonic_product_spectrum(spectrum, harmonics);

    let peak = hps
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1));

    // all-zero energy would otherwise land on bin 0
    let Some((bin, &product)) = peak else {
        return PitchEstimate::unvoiced();
    };
    if product <= 0.0 {
        return PitchEstimate::unvoiced();
    }

    let frequency = bin_to_frequency(bin);
    let amplitude = spectrum[bin];
    if frequency > min_frequency && amplitude > min_amplitude {
        PitchEstimate::from_frequency(frequency, Some(amplitude))
    } else {
        PitchEstimate {
            frequency,
            voiced: false,
            amplitude: Some(amplitude),
            note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SpectralAnalyzer;
    use crate::config::AnalysisConfig;
    use crate::detect::pitch::test_signal::harmonic_tone;

    #[test]
    fn product_reinforces_fundamental() {
        let mut spectrum = vec![0.1f32; 64];
        spectrum[5] = 4.0;
        spectrum[10] = 3.0;
        spectrum[15] = 2.0;
        spectrum[20] = 5.0;
        let hps = harmonic_product_spectrum(&spectrum, 3);
        assert_eq!(hps.len(), 22);
        let best = (1..hps.len())
            .max_by(|&a, &b| hps[a].total_cmp(&hps[b]))
            .unwrap();
        assert_eq!(best, 5);
    }

    #[test]
    fn zero_spectrum_is_unvoiced() {
        let estimate = estimate_pitch(&[0.0; 513], 3, |b| b as f32 * 10.0, 50.0, 100.0);
        assert!(!estimate.voiced);
        assert_eq!(estimate.note, None);
    }

    #[test]
    fn low_cutoff_and_amplitude_floor_gate_voicing() {
        let mut spectrum = vec![0.0f32; 64];
        spectrum[2] = 1000.0;
        spectrum[4] = 1000.0;
        let low = estimate_pitch(&spectrum, 2, |b| b as f32 * 20.0, 50.0, 100.0);
        assert!(!low.voiced);
        assert_eq!(low.frequency, 40.0);

        let quiet = estimate_pitch(&spectrum, 2, |b| b as f32 * 110.0, 50.0, 5000.0);
        assert!(!quiet.voiced);

        let ok = estimate_pitch(&spectrum, 2, |b| b as f32 * 110.0, 50.0, 100.0);
        assert!(ok.voiced);
        assert_eq!(ok.note, Some(57));
    }

    #[test]
    fn estimates_harmonic_tone_over_several_spectra() {
        let analyzer = SpectralAnalyzer::new(44100, &AnalysisConfig::default()).unwrap();
        let mut hps = HpsEstimator::new(&PitchConfig::default(), analyzer.bins()).unwrap();
        assert_eq!(hps.frames_per_capture(), 3);

        assert!(hps.start_capture());
        for k in 0..3 {
            let samples = harmonic_tone(220.0, &[0.5, 0.4, 0.3], 44100, k * 1024, 1024);
            let block = AudioBlock::new(samples, 44100, k as f64 * 1024.0 / 44100.0);
            let spectrum = analyzer.analyze(&block);
            assert!(hps.result().is_none());
            hps.feed(&block, &spectrum);
            if k == 0 {
                assert!(!hps.start_capture());
            }
        }

        let estimate = hps.take_result().unwrap();
        assert!(estimate.voiced);
        let note = estimate.note.unwrap() as i32;
        assert!((note - 57).abs() <= 1, "note {}", note);
        assert_eq!(hps.completed_captures(), 1);
    }

    #[test]
    fn rejects_buffer_shorter_than_a_spectrum() {
        let config = PitchConfig {
            hps_buffer_size: 512,
            ..PitchConfig::default()
        };
        assert!(HpsEstimator::new(&config, 1025).is_err());
    }
}
