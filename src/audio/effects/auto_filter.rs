use crate::audio::filters::{FilterMode, SVF};
use crate::audio::modulators::{Lfo, LfoError, LfoState};
use crate::audio::{wet_dry_mix, AudioNode, AudioProcessor};

/// Lowpass filter with its cutoff swept by a sine LFO.
///
/// The cutoff moves between `base_frequency` and
/// `base_frequency * 2^(octaves * depth)`. A single SVF per channel gives a
/// -12 dB/octave slope.
pub struct AutoFilter {
    left: SVF,
    right: SVF,
    lfo: Lfo,
    depth: f32,
    base_frequency: f32,
    octaves: f32,
    wet: f32,
    lfo_value: f32,
}

impl AutoFilter {
    pub fn new(
        frequency: f32,
        depth: f32,
        base_frequency: f32,
        octaves: f32,
        resonance: f32,
        wet: f32,
        sample_rate: f32,
    ) -> Self {
        let lfo = Lfo::new(frequency, sample_rate);
        let lfo_value = lfo.current_value();
        let mut filter = Self {
            left: SVF::new(base_frequency, resonance, FilterMode::Lowpass, sample_rate),
            right: SVF::new(base_frequency, resonance, FilterMode::Lowpass, sample_rate),
            lfo,
            depth: depth.clamp(0.0, 1.0),
            base_frequency,
            octaves,
            wet: wet.clamp(0.0, 1.0),
            lfo_value,
        };
        filter.update_cutoff();
        filter
    }

    pub fn start(&mut self, at: u64) -> Result<(), LfoError> {
        self.lfo.start(at)
    }

    pub fn stop(&mut self) -> Result<(), LfoError> {
        self.lfo.stop()
    }

    pub fn lfo_state(&self) -> LfoState {
        self.lfo.state()
    }

    pub fn is_running(&self) -> bool {
        self.lfo.is_running()
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.lfo.set_frequency(frequency);
    }

    pub fn frequency(&self) -> f32 {
        self.lfo.frequency()
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
        self.update_cutoff();
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_resonance(&mut self, q: f32) {
        self.left.set_resonance(q);
        self.right.set_resonance(q);
    }

    pub fn resonance(&self) -> f32 {
        self.left.resonance()
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet = wet.clamp(0.0, 1.0);
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }

    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    pub fn octaves(&self) -> f32 {
        self.octaves
    }

    pub fn cutoff(&self) -> f32 {
        self.left.cutoff_frequency()
    }

    fn update_cutoff(&mut self) {
        let cutoff = self.base_frequency * 2f32.powf(self.octaves * self.depth * self.lfo_value);
        self.left.set_cutoff_frequency(cutoff);
        self.right.set_cutoff_frequency(cutoff);
    }
}

impl AudioNode for AutoFilter {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        let left = self.left.process(left_in);
        let right = self.right.process(right_in);
        (
            wet_dry_mix(left_in, left, self.wet),
            wet_dry_mix(right_in, right, self.wet),
        )
    }

    fn tick(&mut self, now: u64) {
        self.lfo_value = self.lfo.tick(now);
        self.update_cutoff();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.lfo.set_sample_rate(sample_rate);
        self.left.set_sample_rate(sample_rate);
        self.right.set_sample_rate(sample_rate);
    }
}
