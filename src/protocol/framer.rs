//! Byte-at-a-time frame reassembly
//!
//! The framer is shared between the thread that receives host bytes and the
//! interpreter thread, so all state lives behind one mutex and every call to
//! [`CommandFramer::feed`] is one atomic transition.

use super::command::CommandFault;
use super::{END_MARKER, MAX_PAYLOAD, START_MARKERS};
use log::warn;
use parking_lot::Mutex;

/// Framer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Waiting for a start marker; everything else is ignored
    AwaitStart,
    /// Next byte is the command code
    ReceiveCommand,
    /// Collecting payload until the end marker
    ReceiveData,
}

/// A complete command frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Start marker that opened the frame
    pub start: u8,
    /// Command code
    pub command: u8,
    /// Payload bytes, including the trailing end marker
    pub payload: Vec<u8>,
}

impl Frame {
    /// Payload without the trailing end marker
    pub fn data(&self) -> &[u8] {
        match self.payload.split_last() {
            Some((&END_MARKER, rest)) => rest,
            _ => &self.payload,
        }
    }
}

/// Counters for protocol activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolStats {
    /// Bytes fed in total
    pub bytes: u64,
    /// Bytes ignored while waiting for a start marker
    pub ignored: u64,
    /// Frames completed
    pub frames: u64,
    /// Frames abandoned because the payload grew past the limit
    pub overflows: u64,
    /// Frames applied to the chip
    pub dispatched: u64,
    /// Frames with an unknown command code
    pub unknown_commands: u64,
    /// Frames with a channel outside 0-2
    pub invalid_channels: u64,
    /// Frames whose payload was too short for the command
    pub short_payloads: u64,
}

#[derive(Debug)]
struct FramerInner {
    state: FramerState,
    start: u8,
    command: u8,
    payload: Vec<u8>,
    stats: ProtocolStats,
}

/// Thread-safe command framer
#[derive(Debug)]
pub struct CommandFramer {
    inner: Mutex<FramerInner>,
}

impl CommandFramer {
    /// Create a framer waiting for a start marker
    pub fn new() -> Self {
        CommandFramer {
            inner: Mutex::new(FramerInner {
                state: FramerState::AwaitStart,
                start: 0,
                command: 0,
                payload: Vec::new(),
                stats: ProtocolStats::default(),
            }),
        }
    }

    /// Feed one byte; returns the frame it completed, if any
    pub fn feed(&self, byte: u8) -> Option<Frame> {
        let mut inner = self.inner.lock();
        inner.stats.bytes += 1;

        match inner.state {
            FramerState::AwaitStart => {
                if START_MARKERS.contains(&byte) {
                    inner.start = byte;
                    inner.payload.clear();
                    inner.state = FramerState::ReceiveCommand;
                } else {
                    inner.stats.ignored += 1;
                }
                None
            }
            FramerState::ReceiveCommand => {
                inner.command = byte;
                inner.state = FramerState::ReceiveData;
                None
            }
            FramerState::ReceiveData => {
                inner.payload.push(byte);
                if byte == END_MARKER {
                    inner.state = FramerState::AwaitStart;
                    inner.stats.frames += 1;
                    return Some(Frame {
                        start: inner.start,
                        command: inner.command,
                        payload: std::mem::take(&mut inner.payload),
                    });
                }
                if inner.payload.len() > MAX_PAYLOAD {
                    warn!(
                        "frame for command {:02X} exceeded {} payload bytes, discarded",
                        inner.command, MAX_PAYLOAD
                    );
                    inner.payload.clear();
                    inner.state = FramerState::AwaitStart;
                    inner.stats.overflows += 1;
                }
                None
            }
        }
    }

    /// Feed a byte sequence, collecting every frame it completes
    pub fn feed_all(&self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    /// Current state
    pub fn state(&self) -> FramerState {
        self.inner.lock().state
    }

    /// Drop any partial frame and wait for a start marker again
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = FramerState::AwaitStart;
        inner.payload.clear();
    }

    /// Snapshot of the protocol counters
    pub fn stats(&self) -> ProtocolStats {
        self.inner.lock().stats
    }

    /// Count the outcome of dispatching a frame (`None` means applied)
    pub fn record_dispatch(&self, fault: Option<&CommandFault>) {
        let mut inner = self.inner.lock();
        match fault {
            None => inner.stats.dispatched += 1,
            Some(CommandFault::UnknownCommand(_)) => inner.stats.unknown_commands += 1,
            Some(CommandFault::InvalidChannel { .. }) => inner.stats.invalid_channels += 1,
            Some(CommandFault::PayloadTooShort { .. }) => inner.stats.short_payloads += 1,
        }
    }
}

impl Default for CommandFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_note_frame() {
        let framer = CommandFramer::new();
        let frames = framer.feed_all(&[0xB5, 0xA4, 0x00, 0xDD, 0x01, 0x0F, 0xB0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].start, 0xB5);
        assert_eq!(frames[0].command, 0xA4);
        assert_eq!(frames[0].payload, vec![0x00, 0xDD, 0x01, 0x0F, 0xB0]);
        assert_eq!(frames[0].data(), &[0x00, 0xDD, 0x01, 0x0F]);
        assert_eq!(framer.state(), FramerState::AwaitStart);
    }

    #[test]
    fn test_no_start_marker_yields_nothing() {
        let framer = CommandFramer::new();
        assert!(framer.feed_all(&[0xFF, 0xAA, 0xBB]).is_empty());
        assert_eq!(framer.state(), FramerState::AwaitStart);
        assert_eq!(framer.stats().ignored, 3);
    }

    #[test]
    fn test_alternate_start_marker() {
        let framer = CommandFramer::new();
        let frames = framer.feed_all(&[0x00, 0xB6, 0xA6, 0xB0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].start, 0xB6);
        assert_eq!(frames[0].payload, vec![0xB0]);
    }

    #[test]
    fn test_command_byte_is_never_payload() {
        let framer = CommandFramer::new();
        // B0 in command position does not close the frame
        assert!(framer.feed(0xB5).is_none());
        assert!(framer.feed(0xB0).is_none());
        assert_eq!(framer.state(), FramerState::ReceiveData);
        let frame = framer.feed(0xB0).unwrap();
        assert_eq!(frame.command, 0xB0);
        assert_eq!(frame.payload, vec![0xB0]);
    }

    #[test]
    fn test_start_marker_inside_payload_is_data() {
        let framer = CommandFramer::new();
        let frames = framer.feed_all(&[0xB5, 0xA2, 0xB5, 0xB6, 0xB0]);
        assert_eq!(frames[0].payload, vec![0xB5, 0xB6, 0xB0]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let framer = CommandFramer::new();
        let frames = framer.feed_all(&[0xB5, 0xA6, 0xB0, 0x12, 0xB6, 0xA0, 0x01, 0xB0]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].command, 0xA0);
        assert_eq!(framer.stats().frames, 2);
    }

    #[test]
    fn test_runaway_payload_is_abandoned() {
        let framer = CommandFramer::new();
        framer.feed(0xB5);
        framer.feed(0xA0);
        for _ in 0..=MAX_PAYLOAD {
            assert!(framer.feed(0x11).is_none());
        }
        assert_eq!(framer.state(), FramerState::AwaitStart);
        assert_eq!(framer.stats().overflows, 1);
    }

    #[test]
    fn test_concurrent_feeders_keep_byte_atomicity() {
        let framer = Arc::new(CommandFramer::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let framer = Arc::clone(&framer);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        framer.feed(0x42);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(framer.stats().bytes, 1000);
        assert_eq!(framer.stats().ignored, 1000);
    }
}
