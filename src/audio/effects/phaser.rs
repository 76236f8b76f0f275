use crate::audio::filters::FirstOrderAllpass;
use crate::audio::oscillators::SineOscillator;
use crate::audio::{wet_dry_mix, AudioGenerator, AudioNode, AudioProcessor};

const STAGES: usize = 4;
const MIN_RATE_HZ: f32 = 0.1;
const MAX_RATE_HZ: f32 = 8.0;
const SWEEP_MIN_HZ: f32 = 200.0;
const SWEEP_MAX_HZ: f32 = 4000.0;

/// Maps the 0..1 rate control onto the LFO frequency
pub fn rate_to_hz(rate: f32) -> f32 {
    MIN_RATE_HZ + rate.clamp(0.0, 1.0) * (MAX_RATE_HZ - MIN_RATE_HZ)
}

struct PhaserChannel {
    stages: [FirstOrderAllpass; STAGES],
    last_output: f32,
}

impl PhaserChannel {
    fn new(sample_rate: f32) -> Self {
        Self {
            stages: std::array::from_fn(|_| FirstOrderAllpass::new(SWEEP_MIN_HZ, sample_rate)),
            last_output: 0.0,
        }
    }

    fn process(&mut self, input: f32, break_frequency: f32, feedback: f32) -> f32 {
        let mut signal = input + self.last_output * feedback;
        for stage in &mut self.stages {
            stage.set_break_frequency(break_frequency);
            signal = stage.process(signal);
        }
        self.last_output = signal;
        signal
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for stage in &mut self.stages {
            stage.set_sample_rate(sample_rate);
        }
    }
}

/// Four-stage allpass phaser. The right channel sweeps in the opposite
/// direction for a wider image.
pub struct Phaser {
    left: PhaserChannel,
    right: PhaserChannel,
    lfo: SineOscillator,
    rate: f32,
    depth: f32,
    feedback: f32,
    wet: f32,
}

impl Phaser {
    pub fn new(rate: f32, depth: f32, feedback: f32, wet: f32, sample_rate: f32) -> Self {
        let mut phaser = Self {
            left: PhaserChannel::new(sample_rate),
            right: PhaserChannel::new(sample_rate),
            lfo: SineOscillator::new(rate_to_hz(rate), sample_rate),
            rate: 0.0,
            depth: depth.clamp(0.0, 1.0),
            feedback: 0.0,
            wet: wet.clamp(0.0, 1.0),
        };
        phaser.set_rate(rate);
        phaser.set_feedback(feedback);
        phaser
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.0, 1.0);
        self.lfo.set_frequency(rate_to_hz(self.rate));
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.9);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet = wet.clamp(0.0, 1.0);
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }

    fn sweep(&self, lfo: f32) -> f32 {
        SWEEP_MIN_HZ * (SWEEP_MAX_HZ / SWEEP_MIN_HZ).powf(lfo * self.depth)
    }
}

impl AudioNode for Phaser {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        let lfo = (self.lfo.next_sample() + 1.0) * 0.5;
        let left = self.left.process(left_in, self.sweep(lfo), self.feedback);
        let right = self.right.process(right_in, self.sweep(1.0 - lfo), self.feedback);
        (
            wet_dry_mix(left_in, left, self.wet),
            wet_dry_mix(right_in, right, self.wet),
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.lfo.set_sample_rate(sample_rate);
        self.left.set_sample_rate(sample_rate);
        self.right.set_sample_rate(sample_rate);
    }
}
