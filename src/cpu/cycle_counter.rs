//! Machine-cycle accounting
//!
//! One machine cycle is twelve oscillator periods. The counter is the time
//! base for serial delivery, bus trace stamps and sample pacing.

/// Running machine-cycle count
#[derive(Debug, Clone, Copy)]
pub struct CycleCounter {
    cycles: u64,
}

impl CycleCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        CycleCounter { cycles: 0 }
    }

    /// Add `n` machine cycles
    pub fn advance(&mut self, n: u64) {
        self.cycles += n;
    }

    /// Machine cycles elapsed since the last reset
    pub fn get_cycles(&self) -> u64 {
        self.cycles
    }

    /// Reset to zero
    pub fn reset(&mut self) {
        self.cycles = 0;
    }

    /// Cycles elapsed since `mark`
    pub fn since(&self, mark: u64) -> u64 {
        self.cycles.saturating_sub(mark)
    }
}

impl Default for CycleCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Machine cycles per second for an oscillator frequency
pub fn machine_cycles_per_second(oscillator_hz: u32) -> f64 {
    oscillator_hz as f64 / 12.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cycle_counter() {
        let mut counter = CycleCounter::new();
        assert_eq!(counter.get_cycles(), 0);

        counter.advance(2);
        let mark = counter.get_cycles();
        counter.advance(98);
        assert_eq!(counter.get_cycles(), 100);
        assert_eq!(counter.since(mark), 98);
        assert_eq!(counter.since(500), 0);

        counter.reset();
        assert_eq!(counter.get_cycles(), 0);
    }

    #[test]
    fn test_machine_cycle_rate() {
        assert_relative_eq!(machine_cycles_per_second(11_059_200), 921_600.0);
        assert_relative_eq!(machine_cycles_per_second(12_000_000), 1_000_000.0);
    }
}
