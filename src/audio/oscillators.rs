use crate::audio::{AudioGenerator, TWO_PI};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const SINE_TABLE_SIZE: usize = 4096;

static SINE_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..SINE_TABLE_SIZE)
        .map(|i| (i as f32 * TWO_PI / SINE_TABLE_SIZE as f32).sin())
        .collect()
});

fn sine_lookup(phase: f32) -> f32 {
    let table_index = ((phase * SINE_TABLE_SIZE as f32) as usize) % SINE_TABLE_SIZE;
    SINE_TABLE[table_index]
}

// Polynomial band-limited step, smooths the discontinuities of saw and square
fn poly_blep(phase: f32, increment: f32) -> f32 {
    if increment <= 0.0 {
        return 0.0;
    }
    if phase < increment {
        let t = phase / increment;
        t + t - t * t - 1.0
    } else if phase > 1.0 - increment {
        let t = (phase - 1.0) / increment;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            _ => Err(format!("Unknown waveform: {}", name)),
        }
    }
}

pub struct PhaseGenerator {
    phase: f32,
    phase_increment: f32,
    frequency: f32,
    sample_rate: f32,
}

impl PhaseGenerator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            frequency,
            sample_rate,
            phase_increment: frequency / sample_rate,
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.phase_increment = frequency / self.sample_rate;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn increment(&self) -> f32 {
        self.phase_increment
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.phase_increment = self.frequency / sample_rate;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    pub fn next_sample(&mut self) -> f32 {
        let sample = self.phase;
        self.phase += self.phase_increment;

        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }
}

pub struct SineOscillator {
    phase_gen: PhaseGenerator,
}

impl SineOscillator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase_gen: PhaseGenerator::new(frequency, sample_rate),
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.phase_gen.set_frequency(frequency);
    }

    pub fn reset(&mut self) {
        self.phase_gen.reset();
    }
}

impl AudioGenerator for SineOscillator {
    fn next_sample(&mut self) -> f32 {
        sine_lookup(self.phase_gen.next_sample())
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phase_gen.set_sample_rate(sample_rate);
    }
}

/// Oscillator with a selectable waveform, used by the keyboard voice
pub struct Oscillator {
    phase_gen: PhaseGenerator,
    waveform: Waveform,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase_gen: PhaseGenerator::new(frequency, sample_rate),
            waveform,
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.phase_gen.set_frequency(frequency);
    }

    pub fn frequency(&self) -> f32 {
        self.phase_gen.frequency()
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn reset(&mut self) {
        self.phase_gen.reset();
    }
}

impl AudioGenerator for Oscillator {
    fn next_sample(&mut self) -> f32 {
        let increment = self.phase_gen.increment();
        let phase = self.phase_gen.next_sample();

        match self.waveform {
            Waveform::Sine => sine_lookup(phase),
            Waveform::Sawtooth => (2.0 * phase - 1.0) - poly_blep(phase, increment),
            Waveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                let shifted = (phase + 0.5) % 1.0;
                naive + poly_blep(phase, increment) - poly_blep(shifted, increment)
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phase_gen.set_sample_rate(sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_generator_wraps() {
        let mut phase = PhaseGenerator::new(11025.0, 44100.0);
        let values: Vec<f32> = (0..5).map(|_| phase.next_sample()).collect();
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 0.0]);
    }

    #[test]
    fn test_every_waveform_stays_bounded() {
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::Triangle,
        ] {
            let mut osc = Oscillator::new(waveform, 440.0, 44100.0);
            let mut peak = 0.0f32;
            for _ in 0..44100 {
                peak = peak.max(osc.next_sample().abs());
            }
            println!("{:?} peak = {:.3}", waveform, peak);
            assert!(peak > 0.9, "{:?} too quiet: {}", waveform, peak);
            assert!(peak <= 1.1, "{:?} overshoots: {}", waveform, peak);
        }
    }

    #[test]
    fn test_waveform_names() {
        assert_eq!(Waveform::from_name("sine"), Ok(Waveform::Sine));
        assert_eq!(Waveform::from_name("saw"), Ok(Waveform::Sawtooth));
        assert!(Waveform::from_name("fatsquare").is_err());
    }

    #[test]
    fn test_sine_starts_at_zero() {
        let mut osc = SineOscillator::new(440.0, 44100.0);
        assert_eq!(osc.next_sample(), 0.0);
    }
}
