//! AY-3-8910 PSG model
//!
//! Register file plus generators. One output sample is produced by running
//! every generator through [`SUBSTEPS_PER_SAMPLE`] internal sub-steps and
//! mixing the gated channels.

use super::generators::{EnvelopeGenerator, NoiseGenerator, ToneGenerator, NUM_CHANNELS};
use super::mixer::{self, MixerFlags};
use super::registers::{Register, RegisterBank, AMPLITUDE_ENVELOPE_MODE, NUM_REGISTERS};
use crate::bus::BusObserver;
use log::trace;

/// Default master clock of the sound board (2 MHz)
pub const DEFAULT_MASTER_CLOCK: u32 = 2_000_000;

/// Internal sub-steps per generated sample (the chip's 16:1 clock ratio)
pub const SUBSTEPS_PER_SAMPLE: usize = 16;

/// AY-3-8910 programmable sound generator
#[derive(Clone, Debug)]
pub struct Ay38910 {
    regs: RegisterBank,
    latch: Option<u8>,
    tones: [ToneGenerator; NUM_CHANNELS],
    noise: NoiseGenerator,
    envelope: EnvelopeGenerator,
    master_clock: u32,
    last_outputs: [bool; NUM_CHANNELS],
    samples_generated: u64,
}

impl Ay38910 {
    /// Create a chip clocked at [`DEFAULT_MASTER_CLOCK`]
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_MASTER_CLOCK)
    }

    /// Create a chip with a custom master clock (used by the conversion helpers)
    pub fn with_clock(master_clock: u32) -> Self {
        Ay38910 {
            regs: RegisterBank::new(),
            latch: None,
            tones: Default::default(),
            noise: NoiseGenerator::new(),
            envelope: EnvelopeGenerator::new(),
            master_clock,
            last_outputs: [false; NUM_CHANNELS],
            samples_generated: 0,
        }
    }

    /// Reset registers and generators to the power-on state
    pub fn reset(&mut self) {
        *self = Self::with_clock(self.master_clock);
    }

    /// Master clock in Hz
    pub fn master_clock(&self) -> u32 {
        self.master_clock
    }

    /// Currently latched register index, if any
    pub fn latched(&self) -> Option<u8> {
        self.latch
    }

    /// Write a register directly
    pub fn write_register(&mut self, reg: Register, value: u8) {
        self.regs.write(reg, value);
        if reg == Register::EnvelopeShape {
            self.envelope.restart(value);
        }
    }

    /// Read a register directly
    pub fn read_register(&self, reg: Register) -> u8 {
        self.regs.read(reg)
    }

    /// 12-bit tone period of `channel`
    pub fn tone_period(&self, channel: usize) -> u16 {
        self.regs.tone_period(channel)
    }

    /// Program the 12-bit tone period of `channel`
    pub fn set_tone_period(&mut self, channel: usize, period: u16) {
        let ch = (channel % NUM_CHANNELS) as u8;
        self.write_register(Register::tone_low(ch), period as u8);
        self.write_register(Register::tone_high(ch), (period >> 8) as u8 & 0x0F);
    }

    /// 5-bit amplitude of `channel` (bit 4 = envelope mode)
    pub fn amplitude(&self, channel: usize) -> u8 {
        self.regs
            .read(Register::amplitude((channel % NUM_CHANNELS) as u8))
            & 0x1F
    }

    /// Program the amplitude of `channel` (masked to 5 bits)
    pub fn set_amplitude(&mut self, channel: usize, amplitude: u8) {
        self.write_register(
            Register::amplitude((channel % NUM_CHANNELS) as u8),
            amplitude & 0x1F,
        );
    }

    /// Enable or disable tone output on `channel`
    pub fn set_tone_enabled(&mut self, channel: usize, enabled: bool) {
        let bit = 1u8 << (channel % NUM_CHANNELS);
        let value = self.regs.read(Register::Mixer);
        let value = if enabled { value & !bit } else { value | bit };
        self.write_register(Register::Mixer, value);
    }

    /// Enable or disable noise output on `channel`
    pub fn set_noise_enabled(&mut self, channel: usize, enabled: bool) {
        let bit = 8u8 << (channel % NUM_CHANNELS);
        let value = self.regs.read(Register::Mixer);
        let value = if enabled { value & !bit } else { value | bit };
        self.write_register(Register::Mixer, value);
    }

    /// Decoded mixer register
    pub fn mixer(&self) -> MixerFlags {
        MixerFlags::from_register(self.regs.read(Register::Mixer))
    }

    /// Snapshot of all 16 registers
    pub fn dump_registers(&self) -> [u8; NUM_REGISTERS] {
        *self.regs.as_array()
    }

    /// Load all 16 registers (R13 restarts the envelope as a normal write would)
    pub fn load_registers(&mut self, regs: &[u8; NUM_REGISTERS]) {
        for (addr, &value) in regs.iter().enumerate() {
            self.write_register(Register::from_addr(addr as u8), value);
        }
    }

    /// Level applied to `channel`: fixed 4-bit level or the envelope
    fn channel_level(&self, channel: usize) -> u8 {
        let amp = self.regs.read(Register::amplitude(channel as u8));
        if amp & AMPLITUDE_ENVELOPE_MODE != 0 {
            self.envelope.level()
        } else {
            amp & 0x0F
        }
    }

    /// Produce one sample in [0, 1]
    pub fn generate_sample(&mut self) -> f32 {
        let periods = [
            self.regs.tone_period(0),
            self.regs.tone_period(1),
            self.regs.tone_period(2),
        ];
        let noise_period = self.regs.noise_period();

        for _ in 0..SUBSTEPS_PER_SAMPLE {
            for (tone, &period) in self.tones.iter_mut().zip(periods.iter()) {
                tone.tick(period);
            }
            self.noise.tick(noise_period);
        }
        self.envelope.tick(self.regs.envelope_period());

        let flags = self.mixer();
        let noise = self.noise.output();
        let mut outputs = [false; NUM_CHANNELS];
        let mut levels = [0u8; NUM_CHANNELS];
        for ch in 0..NUM_CHANNELS {
            outputs[ch] = mixer::channel_gate(
                flags.tone_enabled(ch),
                self.tones[ch].output(),
                flags.noise_enabled(ch),
                noise,
            );
            levels[ch] = self.channel_level(ch);
        }
        self.last_outputs = outputs;
        self.samples_generated += 1;

        mixer::mix(outputs, levels)
    }

    /// Produce `count` samples
    pub fn generate_samples(&mut self, count: usize) -> Vec<f32> {
        (0..count).map(|_| self.generate_sample()).collect()
    }

    /// Gated channel outputs of the last generated sample
    pub fn channel_outputs(&self) -> [bool; NUM_CHANNELS] {
        self.last_outputs
    }

    /// Samples produced since creation or reset
    pub fn samples_generated(&self) -> u64 {
        self.samples_generated
    }
}

impl Default for Ay38910 {
    fn default() -> Self {
        Self::new()
    }
}

impl BusObserver for Ay38910 {
    fn latch_address(&mut self, addr: u8) {
        self.latch = Some(addr & 0x0F);
    }

    fn write_data(&mut self, value: u8) {
        if let Some(index) = self.latch {
            let reg = Register::from_addr(index);
            trace!("{} <- {:02X}", reg, value);
            self.write_register(reg, value);
        }
    }

    fn read_data(&mut self) -> u8 {
        match self.latch {
            Some(index) => self.regs.read(Register::from_addr(index)),
            None => 0xFF,
        }
    }

    fn store_register(&mut self, reg: u8, value: u8) {
        self.write_register(Register::from_addr(reg), value);
    }

    fn load_register(&mut self, reg: u8) -> u8 {
        self.regs.read(Register::from_addr(reg))
    }
}
