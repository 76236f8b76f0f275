use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::effects::Oversample;
use crate::audio::oscillators::Waveform;

/// Environment variable holding the path of a JSON config override
pub const CONFIG_ENV_VAR: &str = "VIRTUAL_SYNTH_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

pub mod ranges {
    use super::ParamRange;

    pub const WET: ParamRange = ParamRange::new(0.0, 1.0);
    pub const VOLUME: ParamRange = ParamRange::new(0.0, 2.0);

    pub const FILTER_FREQUENCY: ParamRange = ParamRange::new(0.1, 10.0);
    pub const FILTER_DEPTH: ParamRange = ParamRange::new(0.0, 1.0);
    pub const FILTER_Q: ParamRange = ParamRange::new(0.1, 20.0);

    pub const DELAY_TIME: ParamRange = ParamRange::new(0.01, 1.0);
    pub const FEEDBACK: ParamRange = ParamRange::new(0.0, 0.9);

    pub const REVERB_DECAY: ParamRange = ParamRange::new(0.1, 10.0);
    pub const REVERB_PRE_DELAY: ParamRange = ParamRange::new(0.0, 1.0);

    pub const DISTORTION: ParamRange = ParamRange::new(0.0, 1.0);
    pub const PERCENT: ParamRange = ParamRange::new(0.0, 100.0);

    pub const PHASER_RATE: ParamRange = ParamRange::new(0.0, 1.0);
    pub const PHASER_DEPTH: ParamRange = ParamRange::new(0.0, 1.0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceConfig {
    pub waveform: Waveform,
    pub volume: f32,
    /// Gain each note ramps up to
    pub note_gain: f32,
    pub attack: f32,
    pub release: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            volume: 0.3,
            note_gain: 0.5,
            attack: 0.01,
            release: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// LFO rate in Hz
    pub frequency: f32,
    pub depth: f32,
    pub base_frequency: f32,
    pub octaves: f32,
    pub resonance: f32,
    pub wet: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            depth: 0.6,
            base_frequency: 200.0,
            octaves: 2.5,
            resonance: 1.0,
            wet: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelayConfig {
    pub delay_time: f32,
    pub feedback: f32,
    pub wet: f32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_time: 0.25,
            feedback: 0.4,
            wet: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbConfig {
    pub decay: f32,
    pub pre_delay: f32,
    pub wet: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            decay: 2.5,
            pre_delay: 0.01,
            wet: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DistortionConfig {
    pub distortion: f32,
    pub wet: f32,
    pub oversample: Oversample,
    pub tone: f32,
    pub level: f32,
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            distortion: 0.4,
            wet: 0.5,
            oversample: Oversample::FourX,
            tone: 100.0,
            level: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhaserConfig {
    pub rate: f32,
    pub depth: f32,
    pub feedback: f32,
    pub wet: f32,
}

impl Default for PhaserConfig {
    fn default() -> Self {
        Self {
            rate: 0.5,
            depth: 0.7,
            feedback: 0.5,
            wet: 0.5,
        }
    }
}

/// Shared output stage behind the effect paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub effects_bus: String,
    pub final_gain: f32,
    pub pre_gain: f32,
    pub limiter_threshold_db: f32,
    pub destination_volume_db: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            effects_bus: "effects".to_string(),
            final_gain: 0.85,
            pre_gain: 0.89,
            limiter_threshold_db: -18.0,
            destination_volume_db: -6.0,
        }
    }
}

/// Every tweakable effect parameter, the values the machine remembers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectParams {
    pub filter: FilterConfig,
    pub delay: DelayConfig,
    pub reverb: ReverbConfig,
    pub distortion: DistortionConfig,
    pub phaser: PhaserConfig,
}

impl EffectParams {
    pub fn clamped(mut self) -> Self {
        self.filter.frequency = ranges::FILTER_FREQUENCY.clamp(self.filter.frequency);
        self.filter.depth = ranges::FILTER_DEPTH.clamp(self.filter.depth);
        self.filter.resonance = ranges::FILTER_Q.clamp(self.filter.resonance);
        self.filter.wet = ranges::WET.clamp(self.filter.wet);

        self.delay.delay_time = ranges::DELAY_TIME.clamp(self.delay.delay_time);
        self.delay.feedback = ranges::FEEDBACK.clamp(self.delay.feedback);
        self.delay.wet = ranges::WET.clamp(self.delay.wet);

        self.reverb.decay = ranges::REVERB_DECAY.clamp(self.reverb.decay);
        self.reverb.pre_delay = ranges::REVERB_PRE_DELAY.clamp(self.reverb.pre_delay);
        self.reverb.wet = ranges::WET.clamp(self.reverb.wet);

        self.distortion.distortion = ranges::DISTORTION.clamp(self.distortion.distortion);
        self.distortion.wet = ranges::WET.clamp(self.distortion.wet);
        self.distortion.tone = ranges::PERCENT.clamp(self.distortion.tone);
        self.distortion.level = ranges::PERCENT.clamp(self.distortion.level);

        self.phaser.rate = ranges::PHASER_RATE.clamp(self.phaser.rate);
        self.phaser.depth = ranges::PHASER_DEPTH.clamp(self.phaser.depth);
        self.phaser.feedback = ranges::FEEDBACK.clamp(self.phaser.feedback);
        self.phaser.wet = ranges::WET.clamp(self.phaser.wet);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthConfig {
    pub voice: VoiceConfig,
    pub effects: EffectParams,
    pub output: OutputConfig,
}

impl SynthConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SynthConfig =
            serde_json::from_str(json).context("Failed to parse synth config")?;
        Ok(config.clamped())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json(&json)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded synth config from {}", path.display());
        Ok(config)
    }

    /// Config from `VIRTUAL_SYNTH_CONFIG`, falling back to defaults
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(Path::new(&path)).unwrap_or_else(|e| {
                warn!("{:#}, using default config", e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn clamped(mut self) -> Self {
        self.voice.volume = ranges::VOLUME.clamp(self.voice.volume);
        self.effects = self.effects.clamped();
        self
    }
}
