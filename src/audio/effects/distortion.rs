use crate::audio::filters::{OnePoleFilter, OnePoleMode};
use crate::audio::{wet_dry_mix, AudioNode, AudioProcessor};
use serde::{Deserialize, Serialize};

const MAX_DRIVE: f32 = 20.0;
const TONE_MIN_HZ: f32 = 200.0;
const TONE_MAX_HZ: f32 = 20000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Oversample {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2x")]
    TwoX,
    #[default]
    #[serde(rename = "4x")]
    FourX,
}

impl Oversample {
    pub fn factor(&self) -> usize {
        match self {
            Oversample::None => 1,
            Oversample::TwoX => 2,
            Oversample::FourX => 4,
        }
    }
}

// Normalized tanh curve; tends to the identity as drive goes to zero
fn shape(x: f32, drive: f32) -> f32 {
    (drive * x).tanh() / drive.tanh()
}

struct ShaperChannel {
    previous: f32,
    tone: OnePoleFilter,
}

impl ShaperChannel {
    fn new(sample_rate: f32) -> Self {
        Self {
            previous: 0.0,
            tone: OnePoleFilter::new(TONE_MAX_HZ, OnePoleMode::Lowpass, sample_rate),
        }
    }

    // Linear upsampling, shaping at the higher rate, then averaging back down
    fn process(&mut self, input: f32, drive: f32, factor: usize) -> f32 {
        let mut sum = 0.0;
        for i in 1..=factor {
            let t = i as f32 / factor as f32;
            let x = self.previous + (input - self.previous) * t;
            sum += shape(x, drive);
        }
        self.previous = input;
        self.tone.process(sum / factor as f32)
    }
}

/// Waveshaping distortion with a post tone control and output level
pub struct Distortion {
    left: ShaperChannel,
    right: ShaperChannel,
    amount: f32,
    drive: f32,
    oversample: Oversample,
    tone: f32,
    level: f32,
    wet: f32,
}

impl Distortion {
    pub fn new(amount: f32, wet: f32, oversample: Oversample, sample_rate: f32) -> Self {
        let mut distortion = Self {
            left: ShaperChannel::new(sample_rate),
            right: ShaperChannel::new(sample_rate),
            amount: 0.0,
            drive: 0.0,
            oversample,
            tone: 100.0,
            level: 100.0,
            wet: wet.clamp(0.0, 1.0),
        };
        distortion.set_amount(amount);
        distortion
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 1.0);
        self.drive = (self.amount * MAX_DRIVE).max(1e-3);
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_oversample(&mut self, oversample: Oversample) {
        self.oversample = oversample;
    }

    pub fn oversample(&self) -> Oversample {
        self.oversample
    }

    /// Tone in percent, 0 is darkest
    pub fn set_tone(&mut self, tone: f32) {
        self.tone = tone.clamp(0.0, 100.0);
        let cutoff = TONE_MIN_HZ * (TONE_MAX_HZ / TONE_MIN_HZ).powf(self.tone / 100.0);
        self.left.tone.set_cutoff_frequency(cutoff);
        self.right.tone.set_cutoff_frequency(cutoff);
    }

    pub fn tone(&self) -> f32 {
        self.tone
    }

    /// Output level in percent of the shaped signal
    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 100.0);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet = wet.clamp(0.0, 1.0);
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }
}

impl AudioNode for Distortion {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        let factor = self.oversample.factor();
        let gain = self.level / 100.0;
        let left = self.left.process(left_in, self.drive, factor) * gain;
        let right = self.right.process(right_in, self.drive, factor) * gain;
        (
            wet_dry_mix(left_in, left, self.wet),
            wet_dry_mix(right_in, right, self.wet),
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.left.tone.set_sample_rate(sample_rate);
        self.right.tone.set_sample_rate(sample_rate);
    }
}
