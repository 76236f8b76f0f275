use crate::audio::buffers::DelayBuffer;
use crate::audio::{wet_dry_mix, AudioNode, AudioProcessor};

// Simple delay line without filtering
pub struct DelayLine {
    buffer: DelayBuffer,
    feedback: f32,
    sample_rate: f32,
}

impl DelayLine {
    pub fn new(max_delay_seconds: f32, sample_rate: f32) -> Self {
        Self {
            buffer: DelayBuffer::new((max_delay_seconds * sample_rate) as usize + 1),
            feedback: 0.0,
            sample_rate,
        }
    }

    pub fn set_delay_seconds(&mut self, delay_seconds: f32) {
        let delay_samples = (delay_seconds * self.sample_rate) as usize;
        self.buffer.set_delay_samples(delay_samples.max(1));
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-1.0, 1.0);
    }

    pub fn read(&self) -> f32 {
        self.buffer.read()
    }

    pub fn read_at(&self, delay_seconds: f32) -> f32 {
        self.buffer
            .read_interpolated(delay_seconds * self.sample_rate)
    }

    pub fn write(&mut self, input: f32, feedback: f32) {
        self.buffer.write(input + feedback * self.feedback);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl AudioProcessor for DelayLine {
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.read();
        self.write(input, delayed);
        delayed
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}

const MAX_DELAY_SECONDS: f32 = 1.0;

/// Stereo echo with feedback and a wet/dry mix
pub struct FeedbackDelay {
    left: DelayLine,
    right: DelayLine,
    delay_time: f32,
    feedback: f32,
    wet: f32,
    sample_rate: f32,
}

impl FeedbackDelay {
    pub fn new(delay_time: f32, feedback: f32, wet: f32, sample_rate: f32) -> Self {
        let mut delay = Self {
            left: DelayLine::new(MAX_DELAY_SECONDS, sample_rate),
            right: DelayLine::new(MAX_DELAY_SECONDS, sample_rate),
            delay_time,
            feedback,
            wet: wet.clamp(0.0, 1.0),
            sample_rate,
        };
        delay.set_delay_time(delay_time);
        delay.set_feedback(feedback);
        delay
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        self.delay_time = seconds.clamp(0.0, MAX_DELAY_SECONDS);
        self.left.set_delay_seconds(self.delay_time);
        self.right.set_delay_seconds(self.delay_time);
    }

    pub fn delay_time(&self) -> f32 {
        self.delay_time
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
        self.left.set_feedback(self.feedback);
        self.right.set_feedback(self.feedback);
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
}

impl AudioNode for FeedbackDelay {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        let left = self.left.process(left_in);
        let right = self.right.process(right_in);
        (
            wet_dry_mix(left_in, left, self.wet),
            wet_dry_mix(right_in, right, self.wet),
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.left = DelayLine::new(MAX_DELAY_SECONDS, sample_rate);
        self.right = DelayLine::new(MAX_DELAY_SECONDS, sample_rate);
        self.set_delay_time(self.delay_time);
        self.set_feedback(self.feedback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_line_basic_operation() {
        let sample_rate = 44100.0;
        let mut delay = DelayLine::new(1.0, sample_rate);
        delay.set_delay_seconds(100.0 / sample_rate);
        delay.set_feedback(0.0);

        assert_eq!(delay.process(1.0), 0.0);

        let mut outputs = Vec::new();
        for _ in 0..120 {
            outputs.push(delay.process(0.0));
        }

        let echo_index = outputs.iter().position(|&x| x > 0.5);
        println!("DelayLine echo at index {:?}", echo_index);
        assert_eq!(echo_index, Some(99));
    }

    #[test]
    fn test_feedback_delay_repeats_decay() {
        let sample_rate = 1000.0;
        let mut delay = FeedbackDelay::new(0.1, 0.5, 1.0, sample_rate);

        delay.process_stereo(1.0, 1.0);
        let mut peaks = Vec::new();
        for i in 1..400 {
            let (left, _) = delay.process_stereo(0.0, 0.0);
            if left.abs() > 1e-3 {
                peaks.push((i, left));
            }
        }

        println!("Echoes: {:?}", peaks);
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks[0], (100, 1.0));
        assert!((peaks[1].1 - 0.5).abs() < 1e-6);
        assert!((peaks[2].1 - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_zero_wet_is_transparent() {
        let mut delay = FeedbackDelay::new(0.25, 0.4, 0.0, 44100.0);
        for i in 0..1000 {
            let input = (i as f32 * 0.01).sin();
            let (left, right) = delay.process_stereo(input, -input);
            assert_eq!(left, input);
            assert_eq!(right, -input);
        }
    }

    #[test]
    fn test_parameters_are_clamped() {
        let mut delay = FeedbackDelay::new(5.0, 2.0, 3.0, 44100.0);
        assert_eq!(delay.delay_time(), 1.0);
        assert_eq!(delay.feedback(), 0.99);
        assert_eq!(delay.wet(), 1.0);
        delay.set_wet(-1.0);
        assert_eq!(delay.wet(), 0.0);
    }
}
