use crate::audio::{AudioProcessor, PI};

// Tan approximation function
fn tan_a(x: f32) -> f32 {
    let x2 = x * x;
    x * (0.999999492001 + x2 * -0.096524608111)
        / (1.0 + x2 * (-0.429867256894 + x2 * 0.009981877999))
}

// Keep the warped cutoff inside the range where tan_a stays accurate
fn clamp_cutoff(cf: f32, sample_rate: f32) -> f32 {
    cf.clamp(10.0, sample_rate * 0.45)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
}

// SVF implementation matching Emilie Gillet's stmlib version
pub struct SVF {
    // State variables
    y0: f32,
    y1: f32,

    // Filter outputs
    lp: f32,
    hp: f32,
    bp: f32,

    // Filter parameters
    mode: FilterMode,
    cf: f32, // Cutoff frequency
    q: f32,  // Resonance

    // Precomputed coefficients
    g: f32,
    r: f32,
    h: f32,
    rpg: f32,

    coeffs_dirty: bool,
    sample_rate: f32,
}

impl SVF {
    pub fn new(cf: f32, q: f32, mode: FilterMode, sample_rate: f32) -> Self {
        let mut svf = Self {
            y0: 0.0,
            y1: 0.0,
            lp: 0.0,
            hp: 0.0,
            bp: 0.0,
            mode,
            cf,
            q,
            g: 0.0,
            r: 0.0,
            h: 0.0,
            rpg: 0.0,
            coeffs_dirty: true,
            sample_rate,
        };
        svf.update_coefficients();
        svf
    }

    fn update_coefficients(&mut self) {
        if self.coeffs_dirty {
            let cf = clamp_cutoff(self.cf, self.sample_rate);
            self.g = tan_a(cf * PI / self.sample_rate);
            self.r = 1.0 / self.q.max(0.001); // Prevent division by zero
            self.h = 1.0 / (1.0 + self.r * self.g + self.g * self.g);
            self.rpg = self.r + self.g;
            self.coeffs_dirty = false;
        }
    }

    pub fn set_cutoff_frequency(&mut self, cf: f32) {
        if (self.cf - cf).abs() > f32::EPSILON {
            self.cf = cf;
            self.coeffs_dirty = true;
        }
    }

    pub fn cutoff_frequency(&self) -> f32 {
        self.cf
    }

    pub fn set_resonance(&mut self, q: f32) {
        if (self.q - q).abs() > f32::EPSILON {
            self.q = q;
            self.coeffs_dirty = true;
        }
    }

    pub fn resonance(&self) -> f32 {
        self.q
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn reset(&mut self) {
        self.y0 = 0.0;
        self.y1 = 0.0;
        self.lp = 0.0;
        self.hp = 0.0;
        self.bp = 0.0;
    }
}

impl AudioProcessor for SVF {
    fn process(&mut self, input: f32) -> f32 {
        self.update_coefficients();

        self.hp = (input - self.rpg * self.y0 - self.y1) * self.h;
        self.bp = self.g * self.hp + self.y0;
        self.y0 = self.g * self.hp + self.bp;
        self.lp = self.g * self.bp + self.y1;
        self.y1 = self.g * self.bp + self.lp;

        match self.mode {
            FilterMode::Lowpass => self.lp,
            FilterMode::Highpass => self.hp,
            FilterMode::Bandpass => self.bp,
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.coeffs_dirty = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnePoleMode {
    Lowpass,
    Highpass,
}

pub struct OnePoleFilter {
    state: f32,
    cutoff: f32,
    mode: OnePoleMode,
    a0: f32,
    b1: f32,
    coeffs_dirty: bool,
    sample_rate: f32,
}

impl OnePoleFilter {
    pub fn new(cutoff: f32, mode: OnePoleMode, sample_rate: f32) -> Self {
        let mut filter = Self {
            state: 0.0,
            cutoff,
            mode,
            a0: 0.0,
            b1: 0.0,
            coeffs_dirty: true,
            sample_rate,
        };
        filter.update_coefficients();
        filter
    }

    fn update_coefficients(&mut self) {
        if self.coeffs_dirty {
            let omega = 2.0 * PI * self.cutoff / self.sample_rate;
            self.b1 = (-omega).exp();
            self.a0 = 1.0 - self.b1;
            self.coeffs_dirty = false;
        }
    }

    pub fn set_cutoff_frequency(&mut self, cutoff: f32) {
        if (self.cutoff - cutoff).abs() > f32::EPSILON {
            self.cutoff = cutoff;
            self.coeffs_dirty = true;
        }
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

impl AudioProcessor for OnePoleFilter {
    fn process(&mut self, input: f32) -> f32 {
        self.update_coefficients();
        let lowpass = self.b1 * self.state + self.a0 * input;
        self.state = lowpass;

        match self.mode {
            OnePoleMode::Lowpass => lowpass,
            OnePoleMode::Highpass => input - lowpass,
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.coeffs_dirty = true;
    }
}

/// First-order allpass, the building block of the phaser.
/// Unity gain at every frequency; the phase shift reaches -90 degrees at the break frequency.
pub struct FirstOrderAllpass {
    coefficient: f32,
    x1: f32,
    y1: f32,
    sample_rate: f32,
}

impl FirstOrderAllpass {
    pub fn new(break_frequency: f32, sample_rate: f32) -> Self {
        let mut allpass = Self {
            coefficient: 0.0,
            x1: 0.0,
            y1: 0.0,
            sample_rate,
        };
        allpass.set_break_frequency(break_frequency);
        allpass
    }

    pub fn set_break_frequency(&mut self, frequency: f32) {
        let t = tan_a(clamp_cutoff(frequency, self.sample_rate) * PI / self.sample_rate);
        self.coefficient = (t - 1.0) / (t + 1.0);
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

impl AudioProcessor for FirstOrderAllpass {
    fn process(&mut self, input: f32) -> f32 {
        let output = self.coefficient * input + self.x1 - self.coefficient * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::oscillators::SineOscillator;
    use crate::audio::AudioGenerator;

    fn rms_through<P: AudioProcessor>(filter: &mut P, frequency: f32, sample_rate: f32) -> f32 {
        let mut osc = SineOscillator::new(frequency, sample_rate);
        let samples = (sample_rate * 0.2) as usize;
        let mut sum = 0.0;
        // Skip the first half to let the filter settle
        for i in 0..samples {
            let out = filter.process(osc.next_sample());
            if i >= samples / 2 {
                sum += out * out;
            }
        }
        (sum / (samples / 2) as f32).sqrt()
    }

    #[test]
    fn test_svf_lowpass_attenuates_high_frequencies() {
        let sample_rate = 44100.0;
        let mut low = SVF::new(500.0, 0.707, FilterMode::Lowpass, sample_rate);
        let mut high = SVF::new(500.0, 0.707, FilterMode::Lowpass, sample_rate);

        let pass = rms_through(&mut low, 100.0, sample_rate);
        let stop = rms_through(&mut high, 8000.0, sample_rate);

        println!("SVF lowpass: 100Hz rms={:.4}, 8kHz rms={:.4}", pass, stop);
        assert!(pass > 0.5, "Passband should be mostly untouched");
        assert!(stop < 0.05, "Stopband should be attenuated");
    }

    #[test]
    fn test_svf_survives_extreme_cutoff() {
        let sample_rate = 44100.0;
        let mut svf = SVF::new(40000.0, 20.0, FilterMode::Lowpass, sample_rate);
        let mut osc = SineOscillator::new(440.0, sample_rate);
        for _ in 0..10000 {
            let out = svf.process(osc.next_sample());
            assert!(out.is_finite());
        }
    }

    #[test]
    fn test_one_pole_highpass_blocks_dc() {
        let mut filter = OnePoleFilter::new(100.0, OnePoleMode::Highpass, 44100.0);
        let mut last = 1.0;
        for _ in 0..44100 {
            last = filter.process(1.0);
        }
        assert!(last.abs() < 1e-3, "DC should decay, got {}", last);
    }

    #[test]
    fn test_first_order_allpass_preserves_level() {
        let sample_rate = 44100.0;
        let mut allpass = FirstOrderAllpass::new(1000.0, sample_rate);
        let level = rms_through(&mut allpass, 3000.0, sample_rate);
        // Sine RMS is 1/sqrt(2)
        assert!(
            (level - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.02,
            "Allpass should keep the level, got {}",
            level
        );
    }
}
