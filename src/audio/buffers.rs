/// Circular sample buffer backing every delay-based node
pub struct DelayBuffer {
    buffer: Vec<f32>,
    delay_samples: usize,
    write_pos: usize,
    mask: usize, // For fast modulo with power-of-2 sizes
}

impl DelayBuffer {
    pub fn new(max_samples: usize) -> Self {
        // Round up to next power of 2 for efficient modulo operations
        let size = max_samples.max(1).next_power_of_two();
        let mask = size - 1;

        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            delay_samples: 0,
            mask,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Delays longer than the buffer are clamped to its length
    pub fn set_delay_samples(&mut self, delay_samples: usize) {
        self.delay_samples = delay_samples.min(self.buffer.len());
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    fn get_read_pos(&self, delay_samples: usize) -> usize {
        if delay_samples <= self.write_pos {
            self.write_pos - delay_samples
        } else {
            self.buffer.len() - (delay_samples - self.write_pos)
        }
    }

    pub fn read_at(&self, delay_samples: usize) -> f32 {
        let delay_samples = delay_samples.min(self.buffer.len());
        let read_pos = self.get_read_pos(delay_samples) & self.mask;
        self.buffer[read_pos]
    }

    /// Fractional read with linear interpolation, used by modulated delays
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let delay = delay_samples.clamp(1.0, (self.buffer.len() - 1) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let a = self.read_at(whole);
        let b = self.read_at(whole + 1);
        a * (1.0 - frac) + b * frac
    }

    pub fn read(&self) -> f32 {
        self.read_at(self.delay_samples)
    }

    pub fn advance(&mut self) {
        self.write_pos = (self.write_pos + 1) & self.mask;
    }

    pub fn write(&mut self, value: f32) {
        self.buffer[self.write_pos] = value;
        self.advance();
    }

    /// Process a sample through the delay (write + read in one operation)
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.read();
        self.write(input);
        output
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
