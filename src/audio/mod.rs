pub mod buffers;
pub mod delays;
pub mod dynamics;
pub mod effects;
pub mod envelopes;
pub mod filters;
pub mod machine;
pub mod modulators;
pub mod oscillators;
pub mod reverbs;
pub mod routing;
pub mod synth;
pub mod voice;

pub const PI: f32 = std::f32::consts::PI;
pub const TWO_PI: f32 = 2.0 * PI;

pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

// Basic trait for audio generators that produce a single sample output
pub trait AudioGenerator {
    fn next_sample(&mut self) -> f32;
    fn set_sample_rate(&mut self, sample_rate: f32);
}

pub trait AudioProcessor {
    fn process(&mut self, input: f32) -> f32;
    fn set_sample_rate(&mut self, sample_rate: f32);
}

pub trait StereoAudioProcessor {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32);
    fn set_sample_rate(&mut self, sample_rate: f32);
}

/// A node that can sit in the effects graph.
/// Every node renders stereo and is clocked by the owning chain.
pub trait AudioNode: Send {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32);

    /// Called once per sample with the chain's absolute sample clock
    fn tick(&mut self, _now: u64) {}

    fn set_sample_rate(&mut self, sample_rate: f32);
}

pub fn sec_to_samples(seconds: f32, sample_rate: f32) -> f32 {
    seconds * sample_rate
}

pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Linear crossfade between the dry and processed signal
pub fn wet_dry_mix(dry: f32, wet: f32, amount: f32) -> f32 {
    dry * (1.0 - amount) + wet * amount
}
