use crate::audio::{db_to_gain, AudioNode};

/// Static stereo gain, used for buses, paths and channel senders
pub struct Gain {
    gain: f32,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn unity() -> Self {
        Self::new(1.0)
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl AudioNode for Gain {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        (left_in * self.gain, right_in * self.gain)
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}
}

const RELEASE_SECONDS: f32 = 0.1;

/// Stereo-linked peak limiter.
///
/// Attack is instantaneous so the output never rises above the threshold;
/// the gain recovers exponentially over roughly 100 ms.
pub struct Limiter {
    threshold_db: f32,
    threshold: f32,
    envelope: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new(threshold_db: f32, sample_rate: f32) -> Self {
        let mut limiter = Self {
            threshold_db,
            threshold: db_to_gain(threshold_db),
            envelope: 0.0,
            release_coeff: 0.0,
        };
        limiter.set_sample_rate(sample_rate);
        limiter
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db;
        self.threshold = db_to_gain(threshold_db);
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Current gain reduction as a linear factor
    pub fn reduction(&self) -> f32 {
        if self.envelope > self.threshold {
            self.threshold / self.envelope
        } else {
            1.0
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

impl AudioNode for Limiter {
    fn process_stereo(&mut self, left_in: f32, right_in: f32) -> (f32, f32) {
        let peak = left_in.abs().max(right_in.abs());
        self.envelope = if peak > self.envelope {
            peak
        } else {
            self.release_coeff * self.envelope + (1.0 - self.release_coeff) * peak
        };

        let gain = self.reduction();
        (left_in * gain, right_in * gain)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.release_coeff = (-1.0 / (RELEASE_SECONDS * sample_rate)).exp();
    }
}
