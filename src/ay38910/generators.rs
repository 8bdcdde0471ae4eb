//! Sound generators for the AY-3-8910
//!
//! - Tone generators (3 channels), square waves from 12-bit periods
//! - Noise generator (shared 17-bit LFSR)
//! - Envelope generator (16 levels, shape from R13)
//!
//! All generators are advanced in internal sub-steps by the chip; one output
//! sample is 16 sub-steps.

/// Number of tone channels
pub const NUM_CHANNELS: usize = 3;

/// Initial LFSR state
pub const NOISE_SEED: u32 = 1;

const LFSR_MASK: u32 = 0x1_FFFF;

/// Tone generator for a single channel
#[derive(Clone, Debug, Default)]
pub struct ToneGenerator {
    counter: u16,
    output: bool,
}

impl ToneGenerator {
    /// Create a new tone generator (counter expired, output low)
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one sub-step with the given period (0 behaves as 1)
    #[inline]
    pub fn tick(&mut self, period: u16) {
        if self.counter <= 1 {
            self.counter = period.max(1);
            self.output = !self.output;
        } else {
            self.counter -= 1;
        }
    }

    /// Current square-wave level
    #[inline]
    pub fn output(&self) -> bool {
        self.output
    }

    /// Remaining sub-steps before the next toggle
    pub fn counter(&self) -> u16 {
        self.counter
    }
}

/// Noise generator (17-bit LFSR, taps at bit 0 and bit 3)
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    counter: u8,
    lfsr: u32,
    output: bool,
}

impl NoiseGenerator {
    /// Create a new noise generator seeded with [`NOISE_SEED`]
    pub fn new() -> Self {
        NoiseGenerator {
            counter: 0,
            lfsr: NOISE_SEED,
            output: false,
        }
    }

    /// Advance one sub-step with the given 5-bit period (0 behaves as 1)
    #[inline]
    pub fn tick(&mut self, period: u8) {
        if self.counter <= 1 {
            self.counter = (period & 0x1F).max(1);
            let bit = (self.lfsr ^ (self.lfsr >> 3)) & 1;
            self.lfsr = ((self.lfsr >> 1) | (bit << 16)) & LFSR_MASK;
            self.output = bit != 0;
        } else {
            self.counter -= 1;
        }
    }

    /// Current noise bit
    #[inline]
    pub fn output(&self) -> bool {
        self.output
    }

    /// Raw shift register state
    pub fn lfsr(&self) -> u32 {
        self.lfsr
    }
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Envelope shape bits (R13)
pub mod shape {
    /// Repeat after the first cycle
    pub const CONTINUE: u8 = 0x08;
    /// Start by rising instead of falling
    pub const ATTACK: u8 = 0x04;
    /// Reverse direction every cycle
    pub const ALTERNATE: u8 = 0x02;
    /// Freeze after the first cycle
    pub const HOLD: u8 = 0x01;
}

/// Envelope generator
///
/// Steps through 16 levels per cycle; the shape register decides what
/// happens after each cycle.
#[derive(Clone, Debug)]
pub struct EnvelopeGenerator {
    shape: u8,
    counter: u32,
    step: u8,
    attack: bool,
    holding: bool,
    level: u8,
}

impl EnvelopeGenerator {
    /// Create an envelope holding at level 0
    pub fn new() -> Self {
        EnvelopeGenerator {
            shape: 0,
            counter: 0,
            step: 0,
            attack: false,
            holding: true,
            level: 0,
        }
    }

    /// Restart with a new shape (a write to R13)
    pub fn restart(&mut self, shape: u8) {
        self.shape = shape & 0x0F;
        self.counter = 0;
        self.step = 0;
        self.attack = self.shape & shape::ATTACK != 0;
        self.holding = false;
        self.level = if self.attack { 0 } else { 15 };
    }

    /// Advance one envelope clock with the given 16-bit period (0 behaves as 1)
    pub fn tick(&mut self, period: u16) {
        if self.holding {
            return;
        }
        self.counter += 1;
        if self.counter < period.max(1) as u32 {
            return;
        }
        self.counter = 0;
        self.advance();
    }

    fn advance(&mut self) {
        self.step += 1;
        if self.step < 16 {
            self.level = if self.attack { self.step } else { 15 - self.step };
            return;
        }

        if self.shape & shape::CONTINUE == 0 {
            self.holding = true;
            self.level = 0;
        } else if self.shape & shape::HOLD != 0 {
            self.holding = true;
            let alternate = self.shape & shape::ALTERNATE != 0;
            self.level = if self.attack != alternate { 15 } else { 0 };
        } else {
            if self.shape & shape::ALTERNATE != 0 {
                self.attack = !self.attack;
            }
            self.step = 0;
            self.level = if self.attack { 0 } else { 15 };
        }
    }

    /// Current envelope level (0-15)
    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Whether the envelope has stopped moving
    pub fn is_holding(&self) -> bool {
        self.holding
    }
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_toggles_every_period() {
        let mut tone = ToneGenerator::new();
        tone.tick(3);
        assert!(tone.output());
        tone.tick(3);
        tone.tick(3);
        assert!(tone.output());
        tone.tick(3);
        assert!(!tone.output());
    }

    #[test]
    fn test_tone_zero_period_is_one() {
        let mut tone = ToneGenerator::new();
        let mut edges = 0;
        let mut last = tone.output();
        for _ in 0..10 {
            tone.tick(0);
            if tone.output() != last {
                edges += 1;
                last = tone.output();
            }
        }
        assert_eq!(edges, 10);
    }

    #[test]
    fn test_noise_lfsr_sequence() {
        let mut noise = NoiseGenerator::new();
        // seed 1: bit = 1 ^ 0 = 1, lfsr = 0 | 1 << 16
        noise.tick(1);
        assert!(noise.output());
        assert_eq!(noise.lfsr(), 0x1_0000);
        noise.tick(1);
        assert!(!noise.output());
        assert_eq!(noise.lfsr(), 0x0_8000);
    }

    #[test]
    fn test_noise_lfsr_stays_17_bit() {
        let mut noise = NoiseGenerator::new();
        for _ in 0..10_000 {
            noise.tick(1);
            assert!(noise.lfsr() <= LFSR_MASK);
            assert_ne!(noise.lfsr(), 0);
        }
    }

    #[test]
    fn test_envelope_decay_then_hold_low() {
        let mut env = EnvelopeGenerator::new();
        env.restart(0x00);
        assert_eq!(env.level(), 15);
        for expected in (0..15).rev() {
            env.tick(1);
            assert_eq!(env.level(), expected);
        }
        env.tick(1);
        assert_eq!(env.level(), 0);
        assert!(env.is_holding());
    }

    #[test]
    fn test_envelope_sawtooth_repeats() {
        let mut env = EnvelopeGenerator::new();
        env.restart(shape::CONTINUE | shape::ATTACK);
        for _ in 0..15 {
            env.tick(1);
        }
        assert_eq!(env.level(), 15);
        env.tick(1);
        assert_eq!(env.level(), 0);
        assert!(!env.is_holding());
    }

    #[test]
    fn test_envelope_triangle_alternates() {
        let mut env = EnvelopeGenerator::new();
        env.restart(shape::CONTINUE | shape::ALTERNATE);
        for _ in 0..16 {
            env.tick(1);
        }
        // second half rises from 0
        assert_eq!(env.level(), 0);
        env.tick(1);
        assert_eq!(env.level(), 1);
    }

    #[test]
    fn test_envelope_attack_hold_high() {
        let mut env = EnvelopeGenerator::new();
        env.restart(shape::CONTINUE | shape::ATTACK | shape::HOLD);
        for _ in 0..40 {
            env.tick(1);
        }
        assert_eq!(env.level(), 15);
        assert!(env.is_holding());
    }

    #[test]
    fn test_envelope_period_divides_steps() {
        let mut env = EnvelopeGenerator::new();
        env.restart(shape::ATTACK);
        env.tick(4);
        env.tick(4);
        env.tick(4);
        assert_eq!(env.level(), 0);
        env.tick(4);
        assert_eq!(env.level(), 1);
    }
}
