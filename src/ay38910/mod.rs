//! AY-3-8910 Programmable Sound Generator
//!
//! Three square-wave tone channels, one noise source, one envelope and a
//! mixer, addressed through a latch/write/read register protocol.

pub mod chip;
pub mod generators;
pub mod mixer;
pub mod registers;

pub use chip::{Ay38910, DEFAULT_MASTER_CLOCK, SUBSTEPS_PER_SAMPLE};
pub use mixer::MixerFlags;
pub use registers::{Register, RegisterBank};

/// Tone period that produces `frequency` Hz at `master_clock`.
///
/// `period = round(master_clock / (16 * frequency))`; non-positive or
/// non-finite frequencies yield 0.
pub fn frequency_to_period(master_clock: u32, frequency: f32) -> u16 {
    if !frequency.is_finite() || frequency <= 0.0 {
        return 0;
    }
    let period = (master_clock as f64 / (16.0 * frequency as f64)).round();
    period.min(u16::MAX as f64) as u16
}

/// Frequency in Hz produced by tone `period` at `master_clock` (0 for period 0)
pub fn period_to_frequency(master_clock: u32, period: u16) -> f32 {
    if period == 0 {
        return 0.0;
    }
    (master_clock as f64 / (16.0 * period as f64)) as f32
}
