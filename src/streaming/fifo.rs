//! Bounded sample FIFO between the sample pipeline and the audio sink
//!
//! One producer (the interpreter thread) and one consumer (the audio
//! callback). Neither side ever waits for the other: a full FIFO drops the
//! new sample, an empty FIFO reads as silence.
//!
//! Memory consumption is fixed at capacity * sizeof(f32) regardless of duration.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Error type for FIFO construction
#[derive(thiserror::Error, Debug, Clone)]
#[error("{0}")]
pub struct FifoError(pub String);

impl From<FifoError> for crate::Ay8051Error {
    fn from(err: FifoError) -> Self {
        crate::Ay8051Error::ConfigError(err.0)
    }
}

/// Producer/consumer counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackStats {
    /// Samples accepted into the FIFO
    pub samples_written: u64,
    /// Samples handed to the consumer
    pub samples_read: u64,
    /// Samples dropped because the FIFO was full
    pub dropped: u64,
    /// Silence samples substituted because the FIFO was empty
    pub underruns: u64,
    /// Current fill level (0.0 to 1.0)
    pub fill_percentage: f32,
}

/// Bounded FIFO of f32 samples
#[derive(Debug)]
pub struct SampleFifo {
    /// Sample storage (protected by mutex for thread safety)
    buffer: Mutex<Vec<f32>>,
    /// Total samples ever written (producer)
    write_pos: AtomicUsize,
    /// Total samples ever read (consumer)
    read_pos: AtomicUsize,
    /// Capacity (power of 2 for efficient modulo operation)
    capacity: usize,
    /// Capacity mask for fast modulo: `pos & mask == pos % capacity`
    mask: usize,
    dropped: AtomicU64,
    underruns: AtomicU64,
}

impl SampleFifo {
    /// Create a new FIFO.
    /// Capacity will be rounded up to the next power of 2.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Requested capacity is 0
    /// - Requested capacity would exceed maximum safe allocation (512 MB)
    pub fn new(requested_capacity: usize) -> Result<Self, FifoError> {
        if requested_capacity == 0 {
            return Err(FifoError("FIFO capacity must be greater than 0".into()));
        }

        let capacity = requested_capacity.next_power_of_two();

        const MAX_CAPACITY: usize = 512 * 1024 * 1024 / std::mem::size_of::<f32>();
        if capacity > MAX_CAPACITY {
            return Err(FifoError(format!(
                "FIFO capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }

        Ok(SampleFifo {
            buffer: Mutex::new(vec![0.0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
            dropped: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        })
    }

    /// Maximum number of samples held at once
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples waiting to be read
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Free slots
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    /// Push one sample; returns `false` (and counts a drop) if the FIFO is full
    pub fn push(&self, sample: f32) -> bool {
        self.write(std::slice::from_ref(&sample)) == 1
    }

    /// Write samples (producer). Samples that do not fit are dropped and counted.
    /// Returns the number of samples accepted.
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let free = self.capacity - write_pos.wrapping_sub(read_pos);
        let to_write = samples.len().min(free);

        for (i, &sample) in samples[..to_write].iter().enumerate() {
            buf[(write_pos.wrapping_add(i)) & self.mask] = sample;
        }
        drop(buf);

        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);

        let rejected = samples.len() - to_write;
        if rejected > 0 {
            self.dropped.fetch_add(rejected as u64, Ordering::Relaxed);
        }
        to_write
    }

    /// Read up to `dest.len()` samples (consumer). Returns how many were read;
    /// the rest of `dest` is left untouched.
    pub fn read(&self, dest: &mut [f32]) -> usize {
        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let available = write_pos.wrapping_sub(read_pos);
        let to_read = dest.len().min(available);

        for (i, slot) in dest[..to_read].iter_mut().enumerate() {
            *slot = buf[(read_pos.wrapping_add(i)) & self.mask];
        }
        drop(buf);

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Fill `dest` completely, substituting silence for missing samples
    pub fn read_or_silence(&self, dest: &mut [f32]) -> usize {
        let read = self.read(dest);
        if read < dest.len() {
            dest[read..].fill(0.0);
            self.underruns
                .fetch_add((dest.len() - read) as u64, Ordering::Relaxed);
        }
        read
    }

    /// Take exactly `count` samples, padding with silence on underrun
    pub fn take_samples(&self, count: usize) -> Vec<f32> {
        let mut out = vec![0.0; count];
        self.read_or_silence(&mut out);
        out
    }

    /// Drain and discard all pending samples
    pub fn flush(&self) {
        let _buf = self.buffer.lock();
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }

    /// Fill level (0.0 to 1.0)
    pub fn fill_percentage(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    /// Snapshot of producer/consumer counters
    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            samples_written: self.write_pos.load(Ordering::Acquire) as u64,
            samples_read: self.read_pos.load(Ordering::Acquire) as u64,
            dropped: self.dropped.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            fill_percentage: self.fill_percentage(),
        }
    }
}
