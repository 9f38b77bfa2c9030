//! Three-band spectral-flux onset detection with an adaptive local threshold.

use std::collections::VecDeque;

use crate::audio::Spectrum;
use crate::config::OnsetConfig;
use crate::error::ConfigError;

const BANDS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnsetState {
    /// No tone flagged this frame.
    Idle,
    /// Tone flagged this frame.
    Active,
}

pub struct OnsetDetector {
    bands: [[f32; 2]; BANDS],
    half_width: usize,
    multiplier: f32,
    energy_rise_margin: f32,
    silence_floor: f32,
    rumble_margin: f32,
    previous_power: [f32; BANDS],
    previous_energy: f32,
    history: VecDeque<[f32; BANDS]>,
    state: OnsetState,
    last_flux: [f32; BANDS],
    last_threshold: [f32; BANDS],
}

impl OnsetDetector {
    pub fn new(config: &OnsetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            bands: config.bands,
            half_width: config.history_half_width,
            multiplier: config.threshold_multiplier,
            energy_rise_margin: config.energy_rise_margin,
            silence_floor: config.silence_floor,
            rumble_margin: config.rumble_margin,
            previous_power: [0.0; BANDS],
            previous_energy: 0.0,
            history: VecDeque::with_capacity(config.history_half_width + 1),
            state: OnsetState::Idle,
            last_flux: [0.0; BANDS],
            last_threshold: [0.0; BANDS],
        })
    }

    pub fn state(&self) -> OnsetState {
        self.state
    }

    pub fn last_flux(&self) -> [f32; BANDS] {
        self.last_flux
    }

    pub fn last_threshold(&self) -> [f32; BANDS] {
        self.last_threshold
    }

    /// Processes one frame. Returns `true` only on the frame that moves the
    /// detector from `Idle` to `Active`.
    pub fn process(&mut self, spectrum: &Spectrum, energy: f32) -> bool {
        let mut power = [0.0f32; BANDS];
        for (p, &[lo, hi]) in power.iter_mut().zip(self.bands.iter()) {
            *p = spectrum.band_power(lo, hi);
        }

        let flux = self.flux(&power);
        if self.history.len() > self.half_width {
            self.history.pop_front();
        }
        self.history.push_back(flux);
        let threshold = self.threshold();

        let energy = if energy.is_finite() { energy } else { 0.0 };
        let energy_rising = energy > self.previous_energy + self.energy_rise_margin;

        let ignored = (flux[1] == 0.0 && flux[2] == 0.0 && flux[0] - threshold[0] < self.rumble_margin)
            || flux[0] < self.silence_floor;

        let active = !ignored
            && flux[0] > threshold[0]
            && flux[1] >= threshold[1]
            && flux[2] >= threshold[2]
            && energy_rising;

        let onset = active && self.state == OnsetState::Idle;
        if onset {
            log::debug!(
                "Onset: flux={:?} threshold={:?} energy {:.3} -> {:.3}",
                flux,
                threshold,
                self.previous_energy,
                energy
            );
        }

        self.state = if active { OnsetState::Active } else { OnsetState::Idle };
        self.previous_power = power;
        self.previous_energy = energy;
        self.last_flux = flux;
        self.last_threshold = threshold;
        onset
    }

    /// Positive-only band power rise, rounded to one decimal.
    fn flux(&self, power: &[f32; BANDS]) -> [f32; BANDS] {
        let mut flux = [0.0f32; BANDS];
        for i in 0..BANDS {
            let rise = power[i] - self.previous_power[i];
            flux[i] = if rise.is_finite() && rise > 0.0 { round1(rise) } else { 0.0 };
        }
        flux
    }

    /// Mean flux over the retained neighbourhood, scaled by the multiplier.
    fn threshold(&self) -> [f32; BANDS] {
        let mut mean = [0.0f32; BANDS];
        for entry in &self.history {
            for i in 0..BANDS {
                mean[i] += entry[i];
            }
        }
        let count = self.history.len().max(1) as f32;
        mean.map(|m| round1(m / count) * self.multiplier)
    }
}

fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
