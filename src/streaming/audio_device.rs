//! Audio device integration using rodio
//!
//! Plays samples pulled from the [`SampleFifo`]. The device never waits for
//! the producer: an empty FIFO plays silence.

use super::{DcFilter, SampleFifo};
use crate::{Ay8051Error, Result};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Samples pulled from the FIFO per refill
const BLOCK_SIZE: usize = 512;

/// Audio source that reads from the sample FIFO
struct FifoSource {
    fifo: Arc<SampleFifo>,
    sample_rate: u32,
    channels: u16,
    finished: Arc<AtomicBool>,
    filter: DcFilter,
    /// Internal buffer for batch reading (reduces lock contention)
    block: Vec<f32>,
    /// Position in the internal buffer
    block_pos: usize,
    /// Output channel of the current frame
    channel_pos: u16,
}

impl FifoSource {
    fn new(fifo: Arc<SampleFifo>, sample_rate: u32, channels: u16, finished: Arc<AtomicBool>) -> Self {
        FifoSource {
            fifo,
            sample_rate,
            channels: channels.max(1),
            finished,
            filter: DcFilter::new(),
            block: vec![0.0; BLOCK_SIZE],
            block_pos: BLOCK_SIZE,
            channel_pos: 0,
        }
    }
}

impl Source for FifoSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(BLOCK_SIZE)
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for FifoSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.block_pos >= self.block.len() {
            // Underrun fills the tail with silence to keep the stream alive
            self.fifo.read_or_silence(&mut self.block);
            self.filter.process_block(&mut self.block);
            self.block_pos = 0;
        }

        // Mono chip output duplicated across device channels
        let sample = self.block[self.block_pos];
        self.channel_pos += 1;
        if self.channel_pos >= self.channels {
            self.channel_pos = 0;
            self.block_pos += 1;
        }
        Some(sample)
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Create a new audio device and start playback
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz (typically 44100)
    /// * `channels` - Number of device channels (the mono stream is duplicated)
    /// * `fifo` - FIFO the sample pipeline publishes into
    pub fn new(sample_rate: u32, channels: u16, fifo: Arc<SampleFifo>) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            Ay8051Error::AudioDeviceError(format!("Failed to create audio stream: {}", e))
        })?;

        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            Ay8051Error::AudioDeviceError(format!("Failed to create audio sink: {}", e))
        })?;

        let finished = Arc::new(AtomicBool::new(false));
        sink.append(FifoSource::new(
            fifo,
            sample_rate,
            channels,
            Arc::clone(&finished),
        ));

        Ok(AudioDevice {
            _stream: stream,
            sink,
            running: Arc::new(AtomicBool::new(true)),
            finished,
        })
    }

    /// Pause playback
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume playback
    pub fn play(&self) {
        self.sink.play();
    }

    /// Check if audio device is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Signal that no more samples will be produced
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.pause();
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_plays_silence_on_underrun() {
        let fifo = Arc::new(SampleFifo::new(16).unwrap());
        let mut source = FifoSource::new(fifo, 44_100, 1, Arc::new(AtomicBool::new(false)));
        for _ in 0..BLOCK_SIZE * 2 {
            assert_eq!(source.next(), Some(0.0));
        }
    }

    #[test]
    fn test_source_duplicates_channels() {
        let fifo = Arc::new(SampleFifo::new(16).unwrap());
        fifo.write(&[0.5, 0.0]);
        let mut source = FifoSource::new(fifo, 44_100, 2, Arc::new(AtomicBool::new(false)));
        let left = source.next().unwrap();
        let right = source.next().unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_source_stops_when_finished() {
        let fifo = Arc::new(SampleFifo::new(16).unwrap());
        let finished = Arc::new(AtomicBool::new(true));
        let mut source = FifoSource::new(fifo, 44_100, 1, finished);
        assert_eq!(source.next(), None);
    }

    #[test]
    fn test_audio_device_creation() {
        let fifo = Arc::new(SampleFifo::new(4096).unwrap());
        match AudioDevice::new(44_100, 1, fifo) {
            Ok(device) => assert!(device.is_running()),
            Err(err) => eprintln!(
                "Skipping streaming::audio_device test (audio backend unavailable): {}",
                err
            ),
        }
    }
}
