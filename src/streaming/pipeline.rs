//! Real-time sample pipeline
//!
//! Clocks the sound chip at a fixed oversampling divisor and publishes each
//! generated sample into the bounded FIFO.

use super::fifo::SampleFifo;
use crate::ay38910::{Ay38910, SUBSTEPS_PER_SAMPLE};
use parking_lot::Mutex;
use std::sync::Arc;

/// Oversampling divisor: `master_clock / sample_rate / 16`, floored, at least 1
pub fn oversampling_divisor(master_clock: u32, sample_rate: u32) -> u32 {
    if sample_rate == 0 {
        return 1;
    }
    (master_clock / sample_rate / SUBSTEPS_PER_SAMPLE as u32).max(1)
}

/// Chip clocking and sample publication
#[derive(Debug)]
pub struct SamplePipeline {
    chip: Arc<Mutex<Ay38910>>,
    fifo: Arc<SampleFifo>,
    divisor: u32,
    counter: u32,
    produced: u64,
}

impl SamplePipeline {
    /// Pipeline clocking `chip` into `fifo`
    pub fn new(
        chip: Arc<Mutex<Ay38910>>,
        fifo: Arc<SampleFifo>,
        master_clock: u32,
        sample_rate: u32,
    ) -> Self {
        SamplePipeline {
            chip,
            fifo,
            divisor: oversampling_divisor(master_clock, sample_rate),
            counter: 0,
            produced: 0,
        }
    }

    /// Clock ticks per generated sample
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// One clock tick. Returns `true` when the tick produced a sample.
    ///
    /// Never blocks on the consumer: a full FIFO drops the sample.
    pub fn clock(&mut self) -> bool {
        self.counter += 1;
        if self.counter < self.divisor {
            return false;
        }
        self.counter = 0;

        let sample = self.chip.lock().generate_sample();
        self.fifo.push(sample);
        self.produced += 1;
        true
    }

    /// Tick until exactly one more sample has been produced
    pub fn clock_sample(&mut self) {
        while !self.clock() {}
    }

    /// Samples generated (including ones the FIFO dropped)
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// FIFO the pipeline publishes into
    pub fn fifo(&self) -> &Arc<SampleFifo> {
        &self.fifo
    }

    /// Chip the pipeline clocks
    pub fn chip(&self) -> &Arc<Mutex<Ay38910>> {
        &self.chip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(master: u32, rate: u32, fifo_len: usize) -> SamplePipeline {
        SamplePipeline::new(
            Arc::new(Mutex::new(Ay38910::with_clock(master))),
            Arc::new(SampleFifo::new(fifo_len).unwrap()),
            master,
            rate,
        )
    }

    #[test]
    fn test_divisor() {
        assert_eq!(oversampling_divisor(2_000_000, 44_100), 2);
        assert_eq!(oversampling_divisor(1_000_000, 44_100), 1);
        assert_eq!(oversampling_divisor(100, 44_100), 1);
        assert_eq!(oversampling_divisor(2_000_000, 0), 1);
        assert_eq!(oversampling_divisor(8_000_000, 22_050), 22);
    }

    #[test]
    fn test_one_sample_per_divisor_ticks() {
        let mut p = pipeline(2_000_000, 44_100, 16);
        assert!(!p.clock());
        assert!(p.clock());
        assert_eq!(p.fifo().available_read(), 1);
        for _ in 0..10 {
            p.clock();
        }
        assert_eq!(p.produced(), 6);
    }

    #[test]
    fn test_full_fifo_keeps_pipeline_running() {
        let mut p = pipeline(2_000_000, 44_100, 4);
        for _ in 0..100 {
            p.clock_sample();
        }
        assert_eq!(p.produced(), 100);
        assert_eq!(p.fifo().available_read(), 4);
        assert_eq!(p.fifo().stats().dropped, 96);
    }
}
