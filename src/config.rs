use serde::Deserialize;
use std::path::Path;

use crate::detect::pitch::PitchStrategy;
use crate::error::ConfigError;
use crate::score::MatchPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub onset: OnsetConfig,
    #[serde(default)]
    pub pitch: PitchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Samples per AudioBlock.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Lowest frequency of interest in Hz; fixes the FFT size.
    #[serde(default = "default_min_frequency")]
    pub min_frequency: f32,
    #[serde(default = "default_true")]
    pub remove_dc: bool,
    #[serde(default = "default_true")]
    pub auto_gain: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnsetConfig {
    /// Low, mid and high band edges in Hz, each `[lo, hi)`.
    #[serde(default = "default_bands")]
    pub bands: [[f32; 2]; 3],
    #[serde(default = "default_history_half_width")]
    pub history_half_width: usize,
    #[serde(default = "default_threshold_multiplier")]
    pub threshold_multiplier: f32,
    #[serde(default = "default_energy_rise_margin")]
    pub energy_rise_margin: f32,
    #[serde(default = "default_silence_floor")]
    pub silence_floor: f32,
    #[serde(default = "default_rumble_margin")]
    pub rumble_margin: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PitchConfig {
    #[serde(default)]
    pub strategy: PitchStrategy,
    #[serde(default = "default_yin_buffer_size")]
    pub yin_buffer_size: usize,
    #[serde(default = "default_yin_threshold")]
    pub yin_threshold: f32,
    /// Power values captured per HPS estimate, rounded down to whole spectra.
    #[serde(default = "default_hps_buffer_size")]
    pub hps_buffer_size: usize,
    #[serde(default = "default_hps_harmonics")]
    pub hps_harmonics: usize,
    #[serde(default = "default_hps_min_frequency")]
    pub hps_min_frequency: f32,
    #[serde(default = "default_hps_min_amplitude")]
    pub hps_min_amplitude: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub policy: MatchPolicy,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: f64,
    #[serde(default = "default_false_positive_weight")]
    pub false_positive_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Emitted notes are released this long after their note-on.
    #[serde(default = "default_note_hold_ms")]
    pub note_hold_ms: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            min_frequency: default_min_frequency(),
            remove_dc: true,
            auto_gain: true,
        }
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            history_half_width: default_history_half_width(),
            threshold_multiplier: default_threshold_multiplier(),
            energy_rise_margin: default_energy_rise_margin(),
            silence_floor: default_silence_floor(),
            rumble_margin: default_rumble_margin(),
        }
    }
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            strategy: PitchStrategy::default(),
            yin_buffer_size: default_yin_buffer_size(),
            yin_threshold: default_yin_threshold(),
            hps_buffer_size: default_hps_buffer_size(),
            hps_harmonics: default_hps_harmonics(),
            hps_min_frequency: default_hps_min_frequency(),
            hps_min_amplitude: default_hps_min_amplitude(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::default(),
            max_latency_ms: default_max_latency_ms(),
            false_positive_weight: default_false_positive_weight(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            note_hold_ms: default_note_hold_ms(),
        }
    }
}

fn default_true() -> bool { true }
fn default_block_size() -> usize { 1024 }
fn default_min_frequency() -> f32 { 25.5 }
fn default_bands() -> [[f32; 2]; 3] { [[80.0, 4000.0], [4000.0, 10000.0], [10000.0, 16000.0]] }
fn default_history_half_width() -> usize { 5 }
fn default_threshold_multiplier() -> f32 { 2.0 }
fn default_energy_rise_margin() -> f32 { 0.08 }
fn default_silence_floor() -> f32 { 5.0 }
fn default_rumble_margin() -> f32 { 40.0 }
fn default_yin_buffer_size() -> usize { 2048 }
fn default_yin_threshold() -> f32 { 0.20 }
fn default_hps_buffer_size() -> usize { 4096 }
fn default_hps_harmonics() -> usize { 3 }
fn default_hps_min_frequency() -> f32 { 50.0 }
fn default_hps_min_amplitude() -> f32 { 100.0 }
fn default_max_latency_ms() -> f64 { 100.0 }
fn default_false_positive_weight() -> f64 { 0.5 }
fn default_note_hold_ms() -> f64 { 300.0 }

impl Config {
    /// Rejects values no component could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.onset.validate()?;
        self.pitch.validate()?;
        self.scoring.validate()?;
        if !(self.output.note_hold_ms.is_finite() && self.output.note_hold_ms >= 0.0) {
            return Err(ConfigError::out_of_range(
                "output.note_hold_ms",
                "a non-negative number",
                self.output.note_hold_ms,
            ));
        }
        Ok(())
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::out_of_range("analysis.block_size", "positive", 0));
        }
        if !(self.min_frequency.is_finite() && self.min_frequency > 0.0) {
            return Err(ConfigError::out_of_range(
                "analysis.min_frequency",
                "a positive frequency",
                self.min_frequency,
            ));
        }
        Ok(())
    }
}

impl OnsetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, &[lo, hi]) in self.bands.iter().enumerate() {
            if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 || lo >= hi {
                return Err(ConfigError::InvalidBand { index, lo, hi });
            }
        }
        if self.history_half_width == 0 {
            return Err(ConfigError::out_of_range("onset.history_half_width", "positive", 0));
        }
        if !(self.threshold_multiplier.is_finite() && self.threshold_multiplier > 0.0) {
            return Err(ConfigError::out_of_range(
                "onset.threshold_multiplier",
                "positive",
                self.threshold_multiplier,
            ));
        }
        for (field, value) in [
            ("onset.energy_rise_margin", self.energy_rise_margin),
            ("onset.silence_floor", self.silence_floor),
            ("onset.rumble_margin", self.rumble_margin),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::out_of_range(field, "a non-negative number", value));
            }
        }
        Ok(())
    }
}

impl PitchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.yin_buffer_size < 4 {
            return Err(ConfigError::out_of_range(
                "pitch.yin_buffer_size",
                "at least 4",
                self.yin_buffer_size,
            ));
        }
        if !(self.yin_threshold > 0.0 && self.yin_threshold < 1.0) {
            return Err(ConfigError::out_of_range(
                "pitch.yin_threshold",
                "within (0, 1)",
                self.yin_threshold,
            ));
        }
        if self.hps_buffer_size == 0 {
            return Err(ConfigError::out_of_range("pitch.hps_buffer_size", "positive", 0));
        }
        if self.hps_harmonics == 0 || self.hps_harmonics > 16 {
            return Err(ConfigError::out_of_range(
                "pitch.hps_harmonics",
                "between 1 and 16",
                self.hps_harmonics,
            ));
        }
        if !(self.hps_min_frequency.is_finite() && self.hps_min_frequency >= 0.0) {
            return Err(ConfigError::out_of_range(
                "pitch.hps_min_frequency",
                "a non-negative frequency",
                self.hps_min_frequency,
            ));
        }
        if !self.hps_min_amplitude.is_finite() {
            return Err(ConfigError::out_of_range(
                "pitch.hps_min_amplitude",
                "finite",
                self.hps_min_amplitude,
            ));
        }
        Ok(())
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_latency_ms.is_finite() && self.max_latency_ms > 0.0) {
            return Err(ConfigError::out_of_range(
                "scoring.max_latency_ms",
                "positive",
                self.max_latency_ms,
            ));
        }
        if !(self.false_positive_weight.is_finite() && self.false_positive_weight >= 0.0) {
            return Err(ConfigError::out_of_range(
                "scoring.false_positive_weight",
                "a non-negative number",
                self.false_positive_weight,
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pitch]
            strategy = "hps"
            hps_harmonics = 4

            [scoring]
            policy = "velocity-state"
            "#,
        )
        .unwrap();
        assert_eq!(config.pitch.strategy, PitchStrategy::Hps);
        assert_eq!(config.pitch.hps_harmonics, 4);
        assert_eq!(config.pitch.yin_buffer_size, 2048);
        assert_eq!(config.scoring.policy, MatchPolicy::VelocityState);
        assert_eq!(config.scoring.max_latency_ms, 100.0);
        assert_eq!(config.onset.bands[1], [4000.0, 10000.0]);
    }

    #[test]
    fn rejects_zero_harmonics() {
        let mut config = Config::default();
        config.pitch.hps_harmonics = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "pitch.hps_harmonics", .. })
        ));
    }

    #[test]
    fn rejects_inverted_band() {
        let mut config = Config::default();
        config.onset.bands[2] = [16000.0, 10000.0];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBand { index: 2, .. })));
    }

    #[test]
    fn rejects_zero_block_size() {
        let mut config = Config::default();
        config.analysis.block_size = 0;
        assert!(config.validate().is_err());
    }
}
