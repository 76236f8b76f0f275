use std::fmt;

use crate::audio::oscillators::SineOscillator;
use crate::audio::AudioGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoError {
    /// `stop` was called while the LFO was neither running nor scheduled
    NotRunning,
    /// `start` was called while the LFO was already running
    AlreadyRunning,
}

impl fmt::Display for LfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LfoError::NotRunning => write!(f, "LFO is not running"),
            LfoError::AlreadyRunning => write!(f, "LFO is already running"),
        }
    }
}

impl std::error::Error for LfoError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoState {
    Stopped,
    /// Waiting for the sample clock to reach the start time
    Scheduled(u64),
    Running,
}

/// Unipolar sine LFO with explicit transport.
///
/// The output holds its last value while stopped so a modulated parameter
/// does not jump when the LFO is restarted.
pub struct Lfo {
    oscillator: SineOscillator,
    frequency: f32,
    state: LfoState,
    current_value: f32,
}

impl Lfo {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            oscillator: SineOscillator::new(frequency, sample_rate),
            frequency,
            state: LfoState::Stopped,
            current_value: 0.5,
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.oscillator.set_frequency(frequency);
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn state(&self) -> LfoState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LfoState::Running
    }

    /// Schedule the LFO to start once the clock reaches `at`
    pub fn start(&mut self, at: u64) -> Result<(), LfoError> {
        if self.state == LfoState::Running {
            return Err(LfoError::AlreadyRunning);
        }
        self.state = LfoState::Scheduled(at);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), LfoError> {
        match self.state {
            LfoState::Stopped => Err(LfoError::NotRunning),
            LfoState::Scheduled(_) | LfoState::Running => {
                self.state = LfoState::Stopped;
                Ok(())
            }
        }
    }

    /// Advance by one sample at absolute time `now`, returning a value in 0..=1
    pub fn tick(&mut self, now: u64) -> f32 {
        if let LfoState::Scheduled(at) = self.state {
            if now >= at {
                self.oscillator.reset();
                self.state = LfoState::Running;
            }
        }

        if self.state == LfoState::Running {
            self.current_value = (self.oscillator.next_sample() + 1.0) * 0.5;
        }

        self.current_value
    }

    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.oscillator.set_sample_rate(sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_when_stopped_is_an_error() {
        let mut lfo = Lfo::new(1.0, 44100.0);
        assert_eq!(lfo.stop(), Err(LfoError::NotRunning));
    }

    #[test]
    fn test_start_waits_for_clock() {
        let mut lfo = Lfo::new(1000.0, 44100.0);
        lfo.start(100).unwrap();

        for now in 0..100 {
            assert_eq!(lfo.tick(now), 0.5, "LFO moved before its start time");
        }

        lfo.tick(100);
        assert!(lfo.is_running());
        let moved = (101..200).any(|now| (lfo.tick(now) - 0.5).abs() > 0.1);
        assert!(moved, "LFO should modulate once running");
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut lfo = Lfo::new(1.0, 44100.0);
        lfo.start(0).unwrap();
        lfo.tick(0);
        assert_eq!(lfo.start(10), Err(LfoError::AlreadyRunning));
    }

    #[test]
    fn test_stop_cancels_schedule_and_holds_value() {
        let mut lfo = Lfo::new(5.0, 1000.0);
        lfo.start(0).unwrap();
        for now in 0..60 {
            lfo.tick(now);
        }
        let held = lfo.current_value();
        lfo.stop().unwrap();
        assert_eq!(lfo.tick(61), held);

        lfo.start(1000).unwrap();
        assert!(lfo.stop().is_ok());
        assert_eq!(lfo.state(), LfoState::Stopped);
    }

    #[test]
    fn test_output_is_unipolar() {
        let mut lfo = Lfo::new(3.0, 1000.0);
        lfo.start(0).unwrap();
        for now in 0..2000 {
            let value = lfo.tick(now);
            assert!((0.0..=1.0).contains(&value));
        }
    }
}
