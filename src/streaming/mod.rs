//! Sample streaming
//!
//! The interpreter thread clocks the chip through a [`SamplePipeline`], which
//! publishes into a bounded [`SampleFifo`]. An audio sink pulls fixed-size
//! blocks from the FIFO on its own deadline. Memory usage is limited to the
//! FIFO size.

pub mod dc_filter;
pub mod fifo;
pub mod pipeline;

#[cfg(feature = "streaming")]
pub mod audio_device;

#[cfg(feature = "streaming")]
pub use audio_device::AudioDevice;
pub use dc_filter::DcFilter;
pub use fifo::{FifoError, PlaybackStats, SampleFifo};
pub use pipeline::{oversampling_divisor, SamplePipeline};

/// Default sample rate (44.1 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Configuration for streaming playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Size of the FIFO (in samples)
    /// Larger buffers = more latency but less chance of underrun
    pub fifo_capacity: usize,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of audio channels
    pub channels: u16,
}

impl StreamConfig {
    /// Create a streaming configuration optimized for low latency
    /// Buffer = 4096 samples ≈ 93ms @ 44.1kHz
    pub fn low_latency(sample_rate: u32) -> Self {
        StreamConfig {
            fifo_capacity: 4096,
            sample_rate,
            channels: 1,
        }
    }

    /// Create a streaming configuration optimized for stability
    /// Buffer = 16384 samples ≈ 372ms @ 44.1kHz
    pub fn stable(sample_rate: u32) -> Self {
        StreamConfig {
            fifo_capacity: 16384,
            sample_rate,
            channels: 1,
        }
    }

    /// Get latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        ((self.fifo_capacity as f32) / (self.sample_rate as f32)) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::low_latency(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stream_config_latency() {
        let config = StreamConfig::low_latency(44_100);
        assert_relative_eq!(config.latency_ms(), 92.879, epsilon = 0.01);
        assert_eq!(StreamConfig::stable(48_000).fifo_capacity, 16384);
    }
}
