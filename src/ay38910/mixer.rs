//! AY-3-8910 Output Mixer
//!
//! R7 gates tone and noise per channel (a set bit disables the source).
//! Channel outputs are averaged into one unipolar sample.

use bitflags::bitflags;

bitflags! {
    /// Mixer Control Register (R7) bitflags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MixerFlags: u8 {
        /// Channel A tone disable
        const TONE_A = 0x01;
        /// Channel B tone disable
        const TONE_B = 0x02;
        /// Channel C tone disable
        const TONE_C = 0x04;
        /// Channel A noise disable
        const NOISE_A = 0x08;
        /// Channel B noise disable
        const NOISE_B = 0x10;
        /// Channel C noise disable
        const NOISE_C = 0x20;
        /// I/O port A direction
        const PORT_A_OUT = 0x40;
        /// I/O port B direction
        const PORT_B_OUT = 0x80;
    }
}

impl MixerFlags {
    /// Create mixer flags from the raw register value
    pub fn from_register(value: u8) -> Self {
        MixerFlags::from_bits_truncate(value)
    }

    /// Whether tone is enabled on `channel` (0-2)
    #[inline]
    pub fn tone_enabled(&self, channel: usize) -> bool {
        self.bits() & (1 << (channel % 3)) == 0
    }

    /// Whether noise is enabled on `channel` (0-2)
    #[inline]
    pub fn noise_enabled(&self, channel: usize) -> bool {
        self.bits() & (8 << (channel % 3)) == 0
    }
}

/// Gate one channel: high if an enabled source is high
#[inline]
pub fn channel_gate(tone_enabled: bool, tone: bool, noise_enabled: bool, noise: bool) -> bool {
    (tone_enabled && tone) || (noise_enabled && noise)
}

/// Mix three gated channels with their 4-bit levels into a sample in [0, 1]
#[inline]
pub fn mix(outputs: [bool; 3], levels: [u8; 3]) -> f32 {
    outputs
        .iter()
        .zip(levels.iter())
        .map(|(&on, &level)| if on { level as f32 / 15.0 } else { 0.0 })
        .sum::<f32>()
        / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mixer_flags() {
        let flags = MixerFlags::from_register(0x3E);
        assert!(flags.tone_enabled(0));
        assert!(!flags.tone_enabled(1));
        assert!(!flags.noise_enabled(0));

        let flags = MixerFlags::from_register(0x37);
        assert!(flags.noise_enabled(0));
        assert!(!flags.noise_enabled(1));
    }

    #[test]
    fn test_gate() {
        assert!(channel_gate(true, true, false, false));
        assert!(!channel_gate(false, true, false, true));
        assert!(channel_gate(false, false, true, true));
        assert!(!channel_gate(true, false, true, false));
    }

    #[test]
    fn test_mix_levels() {
        assert_relative_eq!(mix([true, false, false], [15, 15, 15]), 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(mix([true, true, true], [15, 15, 15]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(mix([true, true, false], [5, 10, 15]), 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(mix([false; 3], [15; 3]), 0.0, epsilon = 1e-6);
    }
}
