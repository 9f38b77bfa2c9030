use super::{Capture, CaptureState, PitchEstimate, PitchEstimator, PitchStrategy};
use crate::audio::{AudioBlock, Spectrum};
use crate::config::PitchConfig;
use crate::error::ConfigError;

/// YIN over a fixed buffer of raw mono samples.
pub struct YinEstimator {
    capture: Capture,
    threshold: f32,
    sample_rate: u32,
    result: Option<PitchEstimate>,
}

impl YinEstimator {
    pub fn new(config: &PitchConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        config.validate()?;
        Ok(Self {
            capture: Capture::new(config.yin_buffer_size),
            threshold: config.yin_threshold,
            sample_rate,
            result: None,
        })
    }
}

impl PitchEstimator for YinEstimator {
    fn strategy(&self) -> PitchStrategy {
        PitchStrategy::Yin
    }

    fn start_capture(&mut self) -> bool {
        self.capture.start()
    }

    fn feed(&mut self, block: &AudioBlock, _spectrum: &Spectrum) {
        let (threshold, sample_rate) = (self.threshold, self.sample_rate);
        if let Some(buffer) = self.capture.push(&block.samples) {
            let estimate = estimate_pitch(buffer, sample_rate, threshold);
            log::debug!(
                "YIN: {:.2}Hz voiced={} note={:?}",
                estimate.frequency,
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

/// Estimates the fundamental of `buffer` with the YIN difference function.
///
/// Lags are searched over `[2, len / 2)`; the first lag whose normalized
/// difference drops below `threshold` is followed down to its local minimum
/// and refined by parabolic interpolation.
pub fn estimate_pitch(buffer: &[f32], sample_rate: u32, threshold: f32) -> PitchEstimate {
    let half = buffer.len() / 2;
    if half < 3 || sample_rate == 0 {
        return PitchEstimate::unvoiced();
    }

    let mut yin_buffer = difference(buffer, half);
    cumulative_mean_normalize(&mut yin_buffer);

    let Some(tau) = absolute_threshold(&yin_buffer, threshold) else {
        return PitchEstimate::unvoiced();
    };

    let lag = parabolic_interpolation(&yin_buffer, tau);
    if !(lag.is_finite() && lag > 0.0) {
        return PitchEstimate::unvoiced();
    }
    PitchEstimate::from_frequency(sample_rate as f32 / lag, None)
}

fn difference(buffer: &[f32], half: usize) -> Vec<f32> {
    let mut diff = vec![0.0f32; half];
    for (tau, slot) in diff.iter_mut().enumerate().skip(1) {
        let mut sum = 0.0;
        for i in 0..half {
            let delta = buffer[i] - buffer[i + tau];
            sum += delta * delta;
        }
        *slot = sum;
    }
    diff
}

/// `d'(tau) = d(tau) * tau / sum(d(1..=tau))`, with `d'(0) = 1`. A zero running
/// sum leaves the value at 1 so silence never looks periodic.
fn cumulative_mean_normalize(diff: &mut [f32]) {
    diff[0] = 1.0;
    let mut running_sum = 0.0;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        if running_sum > 0.0 {
            diff[tau] *= tau as f32 / running_sum;
        } else {
            diff[tau] = 1.0;
        }
        if !diff[tau].is_finite() {
            diff[tau] = 1.0;
        }
    }
}

fn absolute_threshold(yin_buffer: &[f32], threshold: f32) -> Option<usize> {
    let mut tau = 2;
    while tau < yin_buffer.len() {
        if yin_buffer[tau] < threshold {
            while tau + 1 < yin_buffer.len() && yin_buffer[tau + 1] < yin_buffer[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }
    None
}

fn parabolic_interpolation(yin_buffer: &[f32], tau: usize) -> f32 {
    if tau + 1 >= yin_buffer.len() {
        // no right neighbour: keep the better of tau and tau - 1
        return if yin_buffer[tau] <= yin_buffer[tau - 1] {
            tau as f32
        } else {
            (tau - 1) as f32
        };
    }
    let d0 = yin_buffer[tau - 1];
    let d1 = yin_buffer[tau];
    let d2 = yin_buffer[tau + 1];
    let denominator = 2.0 * (2.0 * d1 - d2 - d0);
    if denominator.abs() < f32::EPSILON {
        return tau as f32;
    }
    tau as f32 + (d2 - d0) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::pitch::test_signal::{harmonic_tone, sine};

    fn empty_spectrum() -> Spectrum {
        Spectrum {
            power: Vec::new(),
            sample_rate: 44100,
            fft_size: 2048,
        }
    }

    #[test]
    fn finds_a4() {
        let estimate = estimate_pitch(&sine(440.0, 0.5, 44100, 0, 2048), 44100, 0.2);
        assert!(estimate.voiced);
        assert!((estimate.frequency - 440.0).abs() < 2.0, "{}", estimate.frequency);
        assert_eq!(estimate.note, Some(69));
    }

    #[test]
    fn finds_fundamental_of_harmonic_tone() {
        let tone = harmonic_tone(220.0, &[0.4, 0.3, 0.2], 44100, 0, 2048);
        let estimate = estimate_pitch(&tone, 44100, 0.2);
        assert_eq!(estimate.note, Some(57));
    }

    #[test]
    fn silence_is_unvoiced() {
        let estimate = estimate_pitch(&[0.0; 2048], 44100, 0.2);
        assert!(!estimate.voiced);
        assert_eq!(estimate.note, None);
        assert!(estimate.frequency.is_finite());
    }

    #[test]
    fn constant_signal_is_unvoiced() {
        let estimate = estimate_pitch(&[0.3; 2048], 44100, 0.2);
        assert!(!estimate.voiced);
    }

    #[test]
    fn capture_cycle_spans_blocks() {
        let mut yin = YinEstimator::new(&PitchConfig::default(), 44100).unwrap();
        let spectrum = empty_spectrum();
        let first = AudioBlock::new(sine(440.0, 0.5, 44100, 0, 1024), 44100, 0.0);
        let second = AudioBlock::new(sine(440.0, 0.5, 44100, 1024, 1024), 44100, 0.0232);

        // not capturing: feeding is a no-op
        yin.feed(&first, &spectrum);
        assert_eq!(yin.capture_state(), CaptureState::Idle);

        assert!(yin.start_capture());
        yin.feed(&first, &spectrum);
        assert!(yin.result().is_none());
        assert!(!yin.start_capture());
        yin.feed(&second, &spectrum);

        assert_eq!(yin.completed_captures(), 1);
        assert_eq!(yin.capture_state(), CaptureState::Ready);
        let estimate = yin.take_result().unwrap();
        assert_eq!(estimate.note, Some(69));
        assert_eq!(yin.capture_state(), CaptureState::Idle);
        assert!(yin.result().is_none());
    }

    #[test]
    fn abandon_discards_partial_capture() {
        let mut yin = YinEstimator::new(&PitchConfig::default(), 44100).unwrap();
        let block = AudioBlock::new(sine(440.0, 0.5, 44100, 0, 1024), 44100, 0.0);
        yin.start_capture();
        yin.feed(&block, &empty_spectrum());
        yin.abandon();
        assert_eq!(yin.capture_state(), CaptureState::Idle);
        assert!(yin.result().is_none());
        assert_eq!(yin.completed_captures(), 0);
    }
}
