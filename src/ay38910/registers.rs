//! AY-3-8910 Register Definitions
//!
//! Sixteen 8-bit registers: three 12-bit tone periods, the noise period, the
//! mixer, three amplitudes, the envelope period and shape, and two I/O ports.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt;

/// Number of chip registers
pub const NUM_REGISTERS: usize = 16;

/// Value of the mixer register after reset (all tone and noise disabled)
pub const MIXER_RESET: u8 = 0x3F;

/// Amplitude register bit selecting the envelope instead of the fixed level
pub const AMPLITUDE_ENVELOPE_MODE: u8 = 0x10;

/// AY-3-8910 register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum Register {
    /// R0 - channel A tone period, low byte
    ToneALow = 0x00,
    /// R1 - channel A tone period, high nibble
    ToneAHigh = 0x01,
    /// R2 - channel B tone period, low byte
    ToneBLow = 0x02,
    /// R3 - channel B tone period, high nibble
    ToneBHigh = 0x03,
    /// R4 - channel C tone period, low byte
    ToneCLow = 0x04,
    /// R5 - channel C tone period, high nibble
    ToneCHigh = 0x05,
    /// R6 - noise period (5 bits)
    NoisePeriod = 0x06,
    /// R7 - mixer / enable (active low)
    Mixer = 0x07,
    /// R8 - channel A amplitude
    AmplitudeA = 0x08,
    /// R9 - channel B amplitude
    AmplitudeB = 0x09,
    /// R10 - channel C amplitude
    AmplitudeC = 0x0A,
    /// R11 - envelope period, low byte
    EnvelopeLow = 0x0B,
    /// R12 - envelope period, high byte
    EnvelopeHigh = 0x0C,
    /// R13 - envelope shape
    EnvelopeShape = 0x0D,
    /// R14 - I/O port A
    PortA = 0x0E,
    /// R15 - I/O port B
    PortB = 0x0F,
}

impl Register {
    /// Register for a 4-bit address (upper bits ignored)
    pub fn from_addr(addr: u8) -> Self {
        // Every 4-bit value names a register.
        Register::from_u8(addr & 0x0F).unwrap_or(Register::ToneALow)
    }

    /// Register address
    pub fn addr(self) -> u8 {
        self as u8
    }

    /// Low period byte of `channel` (0-2)
    pub fn tone_low(channel: u8) -> Self {
        Self::from_addr((channel % 3) * 2)
    }

    /// High period nibble of `channel` (0-2)
    pub fn tone_high(channel: u8) -> Self {
        Self::from_addr((channel % 3) * 2 + 1)
    }

    /// Amplitude register of `channel` (0-2)
    pub fn amplitude(channel: u8) -> Self {
        Self::from_addr(8 + channel % 3)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::ToneALow => "Channel A Tone Low",
            Register::ToneAHigh => "Channel A Tone High",
            Register::ToneBLow => "Channel B Tone Low",
            Register::ToneBHigh => "Channel B Tone High",
            Register::ToneCLow => "Channel C Tone Low",
            Register::ToneCHigh => "Channel C Tone High",
            Register::NoisePeriod => "Noise Period",
            Register::Mixer => "Mixer",
            Register::AmplitudeA => "Channel A Amplitude",
            Register::AmplitudeB => "Channel B Amplitude",
            Register::AmplitudeC => "Channel C Amplitude",
            Register::EnvelopeLow => "Envelope Period Low",
            Register::EnvelopeHigh => "Envelope Period High",
            Register::EnvelopeShape => "Envelope Shape",
            Register::PortA => "I/O Port A",
            Register::PortB => "I/O Port B",
        };
        write!(f, "R{} ({})", self.addr(), name)
    }
}

/// Raw register storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}

impl RegisterBank {
    /// Bank in the power-on state
    pub fn new() -> Self {
        let mut registers = [0; NUM_REGISTERS];
        registers[Register::Mixer as usize] = MIXER_RESET;
        RegisterBank { registers }
    }

    /// Read a register
    #[inline]
    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg as usize]
    }

    /// Write a register
    #[inline]
    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg as usize] = value;
    }

    /// 12-bit tone period of `channel`
    pub fn tone_period(&self, channel: usize) -> u16 {
        let ch = (channel % 3) as u8;
        let low = self.read(Register::tone_low(ch)) as u16;
        let high = (self.read(Register::tone_high(ch)) & 0x0F) as u16;
        (high << 8) | low
    }

    /// 5-bit noise period
    pub fn noise_period(&self) -> u8 {
        self.read(Register::NoisePeriod) & 0x1F
    }

    /// 16-bit envelope period
    pub fn envelope_period(&self) -> u16 {
        u16::from_le_bytes([
            self.read(Register::EnvelopeLow),
            self.read(Register::EnvelopeHigh),
        ])
    }

    /// All registers
    pub fn as_array(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}
