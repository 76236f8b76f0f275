use crate::audio::{sec_to_samples, AudioGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Sustain,
    Release,
}

/// Linear gate envelope for a held key.
///
/// `trigger` ramps from silence to the peak level, the level then holds until
/// `release` ramps from wherever it currently is back down to zero.
pub struct NoteEnvelope {
    attack_time: f32,
    release_time: f32,
    peak_level: f32,

    state: EnvelopeState,
    current_level: f32,
    step: f32,
    remaining_samples: u32,
    sample_rate: f32,
}

impl NoteEnvelope {
    pub fn new(attack_time: f32, release_time: f32, peak_level: f32, sample_rate: f32) -> Self {
        Self {
            attack_time: attack_time.max(0.0),
            release_time: release_time.max(0.0),
            peak_level,
            state: EnvelopeState::Idle,
            current_level: 0.0,
            step: 0.0,
            remaining_samples: 0,
            sample_rate,
        }
    }

    pub fn set_attack_time(&mut self, time: f32) {
        self.attack_time = time.max(0.0);
    }

    pub fn set_release_time(&mut self, time: f32) {
        self.release_time = time.max(0.0);
    }

    fn ramp_to(&mut self, target: f32, time: f32) {
        let samples = sec_to_samples(time, self.sample_rate) as u32;
        if samples == 0 {
            self.current_level = target;
            self.step = 0.0;
            self.remaining_samples = 0;
        } else {
            self.step = (target - self.current_level) / samples as f32;
            self.remaining_samples = samples;
        }
    }

    pub fn trigger(&mut self) {
        self.current_level = 0.0;
        self.state = EnvelopeState::Attack;
        self.ramp_to(self.peak_level, self.attack_time);
    }

    pub fn release(&mut self) {
        if self.state != EnvelopeState::Idle {
            self.state = EnvelopeState::Release;
            self.ramp_to(0.0, self.release_time);
        }
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn level(&self) -> f32 {
        self.current_level
    }

    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }
}

impl AudioGenerator for NoteEnvelope {
    fn next_sample(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Idle => 0.0,
            EnvelopeState::Sustain => self.current_level,
            EnvelopeState::Attack | EnvelopeState::Release => {
                if self.remaining_samples > 0 {
                    self.current_level += self.step;
                    self.remaining_samples -= 1;
                }

                if self.remaining_samples == 0 {
                    if self.state == EnvelopeState::Attack {
                        self.current_level = self.peak_level;
                        self.state = EnvelopeState::Sustain;
                    } else {
                        self.current_level = 0.0;
                        self.state = EnvelopeState::Idle;
                    }
                }

                self.current_level
            }
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_reaches_peak_in_time() {
        let sample_rate = 1000.0;
        let mut env = NoteEnvelope::new(0.01, 0.1, 0.5, sample_rate);
        env.trigger();

        let levels: Vec<f32> = (0..10).map(|_| env.next_sample()).collect();
        println!("Attack levels: {:?}", levels);

        assert!((levels[4] - 0.25).abs() < 1e-5);
        assert_eq!(levels[9], 0.5);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert_eq!(env.next_sample(), 0.5);
    }

    #[test]
    fn test_release_from_current_level() {
        let sample_rate = 1000.0;
        let mut env = NoteEnvelope::new(0.01, 0.1, 0.5, sample_rate);
        env.trigger();

        // Release halfway through the attack
        for _ in 0..5 {
            env.next_sample();
        }
        let level_at_release = env.level();
        env.release();

        let first = env.next_sample();
        assert!(first < level_at_release);

        for _ in 0..99 {
            env.next_sample();
        }
        assert_eq!(env.state(), EnvelopeState::Idle);
        assert_eq!(env.next_sample(), 0.0);
    }

    #[test]
    fn test_release_while_idle_is_ignored() {
        let mut env = NoteEnvelope::new(0.01, 0.1, 0.5, 44100.0);
        env.release();
        assert!(!env.is_active());
    }

    #[test]
    fn test_zero_attack_jumps_to_peak() {
        let mut env = NoteEnvelope::new(0.0, 0.1, 0.5, 44100.0);
        env.trigger();
        assert_eq!(env.next_sample(), 0.5);
    }
}
