use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::block::AudioBlock;
use crate::config::AnalysisConfig;
use crate::error::ConfigError;

/// Power spectrum of one block: `fft_size / 2 + 1` non-negative bins.
#[derive(Clone, Debug)]
pub struct Spectrum {
    pub power: Vec<f32>,
    pub sample_rate: u32,
    pub fft_size: usize,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Center frequency of `bin` in Hz: `bin * sample_rate / (2 * (len - 1))`.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin_frequency(bin, self.sample_rate, self.fft_size)
    }

    /// Summed power of the bins whose center lies in `[lo_hz, hi_hz)`.
    pub fn band_power(&self, lo_hz: f32, hi_hz: f32) -> f32 {
        if hi_hz <= lo_hz || self.power.is_empty() {
            return 0.0;
        }
        let resolution = self.sample_rate as f32 / self.fft_size as f32;
        let lo_bin = (lo_hz / resolution).ceil().max(0.0) as usize;
        let hi_bin = ((hi_hz / resolution).ceil() as usize).min(self.power.len());
        if lo_bin >= hi_bin {
            return 0.0;
        }
        self.power[lo_bin..hi_bin].iter().sum()
    }

    pub fn total_power(&self) -> f32 {
        self.power.iter().sum()
    }
}

pub fn bin_frequency(bin: usize, sample_rate: u32, fft_size: usize) -> f32 {
    bin as f32 * sample_rate as f32 / fft_size as f32
}

/// Windowed FFT front end. The transform size is the smallest power of two
/// that resolves `min_frequency` at the track's sample rate.
pub struct SpectralAnalyzer {
    sample_rate: u32,
    fft_size: usize,
    remove_dc: bool,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32, config: &AnalysisConfig) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        config.validate()?;

        let fft_size = transform_size(sample_rate, config.min_frequency);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        log::debug!(
            "Spectral analyzer: {}Hz, fft_size={}, resolution={:.2}Hz",
            sample_rate,
            fft_size,
            sample_rate as f32 / fft_size as f32
        );

        Ok(Self {
            sample_rate,
            fft_size,
            remove_dc: config.remove_dc,
            window: hann_window(config.block_size.min(fft_size)),
            fft,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins in every spectrum this analyzer produces.
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin_frequency(bin, self.sample_rate, self.fft_size)
    }

    /// Hann-windows the block (truncated to the transform size), zero-pads and
    /// returns its power spectrum.
    pub fn analyze(&self, block: &AudioBlock) -> Spectrum {
        let n = block.samples.len().min(self.fft_size);
        let samples = &block.samples[..n];

        let mean = if self.remove_dc && n > 0 {
            samples.iter().sum::<f32>() / n as f32
        } else {
            0.0
        };

        let fallback;
        let window: &[f32] = if self.window.len() == n {
            &self.window
        } else {
            fallback = hann_window(n);
            &fallback
        };

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.fft_size];
        for (i, (&s, &w)) in samples.iter().zip(window.iter()).enumerate() {
            buffer[i] = Complex::new((s - mean) * w, 0.0);
        }
        self.fft.process(&mut buffer);

        let power = buffer[..self.bins()]
            .iter()
            .map(|c| {
                let p = c.norm_sqr();
                if p.is_finite() { p } else { 0.0 }
            })
            .collect();

        Spectrum {
            power,
            sample_rate: self.sample_rate,
            fft_size: self.fft_size,
        }
    }
}

fn transform_size(sample_rate: u32, min_frequency: f32) -> usize {
    let needed = (sample_rate as f32 / min_frequency).ceil().max(2.0) as usize;
    needed.next_power_of_two()
}

fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
