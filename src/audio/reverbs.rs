use crate::audio::buffers::DelayBuffer;
use crate::audio::delays::DelayLine;
use crate::audio::oscillators::SineOscillator;
use crate::audio::{wet_dry_mix, AudioGenerator, AudioNode, AudioProcessor, StereoAudioProcessor};

const CHANNELS: usize = 8;

// Fast Hadamard Transform for 8x8
fn fast_hadamard_transform_8(signals: &mut [f32; 8]) {
    // Stage 1: 8 -> 4 blocks
    let mut temp = [0.0f32; 8];
    for i in 0..4 {
        temp[i] = signals[i] + signals[i + 4];
        temp[i + 4] = signals[i] - signals[i + 4];
    }
    *signals = temp;

    // Stage 2: 4 -> 2 blocks
    for i in 0..2 {
        temp[i] = signals[i] + signals[i + 2];
        temp[i + 2] = signals[i] - signals[i + 2];
        temp[i + 4] = signals[i + 4] + signals[i + 6];
        temp[i + 6] = signals[i + 4] - signals[i + 6];
    }
    *signals = temp;

    // Stage 3: 2 -> 1 blocks
    for i in 0..4 {
        let base = i * 2;
        temp[base] = signals[base] + signals[base + 1];
        temp[base + 1] = signals[base] - signals[base + 1];
    }
    *signals = temp;

    // Normalize by 1/sqrt(8) for energy conservation
    let scale = 1.0 / (8.0f32).sqrt();
    for signal in signals.iter_mut() {
        *signal *= scale;
    }
}

// Householder transform for feedback stage mixing
fn householder_transform_8(signals: &mut [f32; 8]) {
    let sum: f32 = signals.iter().sum();
    let reflection = sum * (-2.0 / 8.0);

    for signal in signals.iter_mut() {
        *signal += reflection;
    }
}

pub struct DiffusionStage8 {
    delay_lines: [DelayLine; CHANNELS],
    flip_polarity: [bool; CHANNELS],
}

impl DiffusionStage8 {
    pub fn new(min_delay_seconds: f32, max_delay_seconds: f32, sample_rate: f32) -> Self {
        let segment_size = (max_delay_seconds - min_delay_seconds) / CHANNELS as f32;

        // Divide range into 8 equal segments, one channel per segment
        let delay_lines = std::array::from_fn(|c| {
            let segment_start = min_delay_seconds + (c as f32 * segment_size);
            let segment_end = segment_start + segment_size;

            // Convert to microseconds for integer random generation
            let segment_start_us = (segment_start * 1_000_000.0) as i32;
            let segment_end_us = (segment_end * 1_000_000.0) as i32;
            let delay_seconds = fastrand::i32(segment_start_us..segment_end_us) as f32 / 1_000_000.0;

            let mut delay_line = DelayLine::new(delay_seconds, sample_rate);
            delay_line.set_delay_seconds(delay_seconds);
            delay_line
        });

        Self {
            delay_lines,
            flip_polarity: std::array::from_fn(|_| fastrand::bool()),
        }
    }

    pub fn process(&mut self, input: [f32; CHANNELS]) -> [f32; CHANNELS] {
        let mut delayed = [0.0f32; CHANNELS];
        for i in 0..CHANNELS {
            delayed[i] = AudioProcessor::process(&mut self.delay_lines[i], input[i]);
        }

        fast_hadamard_transform_8(&mut delayed);

        for (sample, flip) in delayed.iter_mut().zip(self.flip_polarity) {
            if flip {
                *sample = -*sample;
            }
        }

        delayed
    }

    pub fn clear(&mut self) {
        for line in &mut self.delay_lines {
            line.clear();
        }
    }
}

pub struct FeedbackStage8 {
    base_delays: [f32; CHANNELS],
    delay_lines: [DelayLine; CHANNELS],
    lfos: [SineOscillator; 4],
    feedback: f32,
    modulation_depth: f32,
}

impl FeedbackStage8 {
    pub fn new(min_delay_seconds: f32, max_delay_seconds: f32, sample_rate: f32) -> Self {
        // Exponential distribution between min and max
        let base_delays: [f32; CHANNELS] = std::array::from_fn(|c| {
            let r = c as f32 / (CHANNELS - 1) as f32;
            min_delay_seconds * (max_delay_seconds / min_delay_seconds).powf(r)
        });

        let mut stage = Self {
            base_delays,
            delay_lines: std::array::from_fn(|c| DelayLine::new(base_delays[c] * 1.5, sample_rate)),
            lfos: [
                SineOscillator::new(0.19, sample_rate),
                SineOscillator::new(0.37, sample_rate),
                SineOscillator::new(0.29, sample_rate),
                SineOscillator::new(0.41, sample_rate),
            ],
            feedback: 0.5,
            modulation_depth: 0.2,
        };
        stage.set_feedback(0.5);
        stage
    }

    /// Average loop time, used to convert a decay time into a feedback gain
    pub fn mean_delay_seconds(&self) -> f32 {
        self.base_delays.iter().sum::<f32>() / CHANNELS as f32
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.999);
        for line in &mut self.delay_lines {
            line.set_feedback(self.feedback);
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(sample_rate);
        }
    }

    pub fn process(&mut self, diffusion: [f32; CHANNELS]) -> [f32; CHANNELS] {
        // Unipolar modulation values, 4 LFOs shared across 8 delays
        let lfo_values: [f32; 4] =
            std::array::from_fn(|i| (self.lfos[i].next_sample() + 1.0) * 0.5);

        let mut echoes = [0.0f32; CHANNELS];
        for i in 0..CHANNELS {
            let modulated_delay =
                self.base_delays[i] * (1.0 + lfo_values[i % 4] * self.modulation_depth * 0.1);
            echoes[i] = self.delay_lines[i].read_at(modulated_delay);
        }

        householder_transform_8(&mut echoes);

        for i in 0..CHANNELS {
            self.delay_lines[i].write(diffusion[i], echoes[i]);
        }

        echoes
    }

    pub fn clear(&mut self) {
        for line in &mut self.delay_lines {
            line.clear();
        }
    }
}

// Design from https://signalsmith-audio.co.uk/writing/2021/lets-write-a-reverb/
pub struct FDNReverb {
    diffusion_stages: [DiffusionStage8; 4],
    feedback_stage: FeedbackStage8,
}

impl FDNReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            diffusion_stages: [
                DiffusionStage8::new(0.01, 0.025, sample_rate),
                DiffusionStage8::new(0.01, 0.025, sample_rate),
                DiffusionStage8::new(0.025, 0.05, sample_rate),
                DiffusionStage8::new(0.025, 0.05, sample_rate),
            ],
            feedback_stage: FeedbackStage8::new(0.05, 0.150, sample_rate), // 50-150ms range
        }
    }

    /// Feedback gain that drops the tail by 60 dB after `decay_seconds`
    pub fn set_decay_time(&mut self, decay_seconds: f32) {
        let loop_time = self.feedback_stage.mean_delay_seconds();
        let gain = 0.001f32.powf(loop_time / decay_seconds.max(0.01));
        self.feedback_stage.set_feedback(gain);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback_stage.feedback
    }

    pub fn clear(&mut self) {
        for stage in &mut self.diffusion_stages {
            stage.clear();
        }
        self.feedback_stage.clear();
    }
}

impl StereoAudioProcessor for FDNReverb {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut reflections = [0.0f32; CHANNELS];
        reflections[0] = left * 0.5;
        reflections[1] = right * 0.5;

        for stage in &mut self.diffusion_stages {
            reflections = stage.process(reflections);
        }

        let echoes = self.feedback_stage.process(reflections);

        // Mix down to stereo - combine odd/even channels and add reflections
        let mut out_left = 0.0;
        let mut out_right = 0.0;
        for i in 0..4 {
            out_left += (echoes[i * 2] * 0.7) + (reflections[i * 2] * 0.3);
            out_right += (echoes[i * 2 + 1] * 0.7) + (reflections[i * 2 + 1] * 0.3);
        }

        (out_left * 0.5, out_right * 0.5)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.feedback_stage.set_sample_rate(sample_rate);
    }
}

const MAX_PRE_DELAY_SECONDS: f32 = 1.0;

/// Room reverb with decay time, pre-delay and wet/dry mix
pub struct Reverb {
    fdn: FDNReverb,
    pre_delay_left: DelayBuffer,
    pre_delay_right: DelayBuffer,
    decay: f32,
    pre_delay: f32,
    wet: f32,
    sample_rate: f32,
}

impl Reverb {
    pub fn new(decay: f32, pre_delay: f32, wet: f32, sample_rate: f32) -> Self {
        let max_pre_delay = (MAX_PRE_DELAY_SECONDS * sample_rate) as usize + 1;
        let mut reverb = Self {
            fdn: FDNReverb::new(sample_rate),
            pre_delay_left: DelayBuffer::new(max_pre_delay),
            pre_delay_right: DelayBuffer::new(max_pre_delay),
            decay,
            pre_delay,
            wet: wet.clamp(0.0, 1.0),
            sample_rate,
        };
        reverb.set_decay(decay);
        reverb.set_pre_delay(pre_delay);
        reverb
    }

    pub fn set_decay(&mut self, seconds: f32) {
        self.decay = seconds.max(0.01);
        self.fdn.set_decay_time(self.decay);
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn set_pre_delay(&mut self, seconds: f32) {
        self.pre_delay = seconds.clamp(0.0, MAX_PRE_DELAY_SECONDS);
        let samples = (self.pre_delay * self.sample_rate) as usize;
        self.pre_delay_left.set_delay_samples(samples);
        self.pre_delay_right.set_delay_samples(samples);
    }

    pub fn pre_delay(&self) -> f32 {
        self.pre_delay
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet = wet.clamp(0.0, 1.0);
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }

    pub fn feedback(&self) -> f32 {
        self.fdn.feedback()
    }
}

impl AudioNode for Reverb {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        // A zero pre-delay reads the sample that was just written
        self.pre_delay_left.write(left_in);
        self.pre_delay_right.write(right_in);
        let delayed_left = self.pre_delay_left.read_at(self.pre_delay_left.delay_samples().max(1));
        let delayed_right = self
            .pre_delay_right
            .read_at(self.pre_delay_right.delay_samples().max(1));

        let (wet_left, wet_right) = self.fdn.process(delayed_left, delayed_right);
        (
            wet_dry_mix(left_in, wet_left, self.wet),
            wet_dry_mix(right_in, wet_right, self.wet),
        )
    }

    // Delay lengths are fixed in samples, so the network is rebuilt
    fn set_sample_rate(&mut self, sample_rate: f32) {
        *self = Reverb::new(self.decay, self.pre_delay, self.wet, sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_hadamard_transform_8_impulse() {
        let mut signals = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        fast_hadamard_transform_8(&mut signals);

        // H₈ * [1,0,0,0,0,0,0,0]ᵀ = [1,1,1,1,1,1,1,1]ᵀ / √8
        let expected_value = 1.0 / (8.0f32).sqrt();
        for (i, &value) in signals.iter().enumerate() {
            assert!(
                (value - expected_value).abs() < 1e-6,
                "Impulse transform failed at index {}: expected {}, got {}",
                i,
                expected_value,
                value
            );
        }
    }

    #[test]
    fn test_fast_hadamard_transform_8_energy_conservation() {
        let test_inputs = [
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0],
            [0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0],
        ];

        for test_input in test_inputs.iter() {
            let mut signals = *test_input;
            let input_energy: f32 = signals.iter().map(|x| x * x).sum();
            fast_hadamard_transform_8(&mut signals);
            let output_energy: f32 = signals.iter().map(|x| x * x).sum();

            assert!(
                (input_energy - output_energy).abs() < 1e-4,
                "Energy not conserved: input={}, output={}",
                input_energy,
                output_energy
            );
        }
    }

    #[test]
    fn test_householder_preserves_energy() {
        let mut signals = [0.3, -0.2, 0.9, 0.1, 0.0, -0.5, 0.25, 0.7];
        let before: f32 = signals.iter().map(|x| x * x).sum();
        householder_transform_8(&mut signals);
        let after: f32 = signals.iter().map(|x| x * x).sum();
        assert!((before - after).abs() < 1e-4);
    }

    #[test]
    fn test_longer_decay_means_more_feedback() {
        let mut reverb = Reverb::new(0.5, 0.0, 1.0, 44100.0);
        let short = reverb.feedback();
        reverb.set_decay(8.0);
        let long = reverb.feedback();
        println!("Feedback for 0.5s = {:.3}, 8s = {:.3}", short, long);
        assert!(long > short);
        assert!(long < 1.0);
    }

    #[test]
    fn test_reverb_tail_is_stable_and_audible() {
        let sample_rate = 44100.0;
        let mut reverb = Reverb::new(2.5, 0.01, 1.0, sample_rate);

        reverb.process_stereo(1.0, 1.0);

        let mut max_amplitude = 0.0f32;
        let mut energy_early = 0.0f32;
        let mut energy_late = 0.0f32;
        let total = (sample_rate * 3.0) as usize;
        for i in 0..total {
            let (left, right) = reverb.process_stereo(0.0, 0.0);
            assert!(left.is_finite() && right.is_finite());
            let amplitude = left.abs().max(right.abs());
            max_amplitude = max_amplitude.max(amplitude);
            if i < total / 3 {
                energy_early += left * left + right * right;
            } else if i >= 2 * total / 3 {
                energy_late += left * left + right * right;
            }
        }

        println!(
            "Reverb tail: max={:.4}, early energy={:.6}, late energy={:.6}",
            max_amplitude, energy_early, energy_late
        );
        assert!(max_amplitude > 0.0, "Reverb produced no tail");
        assert!(max_amplitude < 1.0, "Reverb should remain stable");
        assert!(energy_late < energy_early, "Reverb tail should decay");
    }

    #[test]
    fn test_pre_delay_holds_back_the_tail() {
        let sample_rate = 44100.0;
        let mut reverb = Reverb::new(2.5, 0.5, 1.0, sample_rate);
        reverb.process_stereo(1.0, 1.0);

        // Diffusion adds at least 10ms on top of the pre-delay
        for _ in 0..(sample_rate * 0.5) as usize {
            let (left, right) = reverb.process_stereo(0.0, 0.0);
            assert_eq!(left, 0.0);
            assert_eq!(right, 0.0);
        }
    }

    #[test]
    fn test_pre_delay_follows_sample_rate() {
        let mut reverb = Reverb::new(2.5, 0.5, 1.0, 22050.0);
        reverb.set_sample_rate(48000.0);
        assert_eq!(reverb.pre_delay(), 0.5);
        assert_eq!(reverb.wet(), 1.0);
        reverb.process_stereo(1.0, 1.0);

        for _ in 0..24000 {
            let (left, right) = reverb.process_stereo(0.0, 0.0);
            assert_eq!(left, 0.0);
            assert_eq!(right, 0.0);
        }
    }
}
