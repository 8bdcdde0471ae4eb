//! Bus cycle recording
//!
//! Captures the latch/write/read cycles the firmware performs on the sound
//! chip, stamped with the interpreter's machine-cycle counter. Useful for
//! comparing firmware behavior against captures from real hardware.

use super::bridge::BusAction;
use serde::Serialize;

/// One recorded bus cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusEvent {
    /// Machine cycle at which the port write happened
    pub cycle: u64,
    /// Decoded bus action
    pub action: BusAction,
    /// Register involved, if one had been latched
    pub register: Option<u8>,
    /// Register index for latches, data byte for writes and reads
    pub value: u8,
}

/// Bounded in-memory log of bus events
#[derive(Debug, Clone, Default)]
pub struct BusTrace {
    events: Vec<BusEvent>,
    capacity: usize,
    dropped: u64,
}

impl BusTrace {
    /// Trace keeping at most `capacity` events; later events are counted but dropped
    pub fn with_capacity(capacity: usize) -> Self {
        BusTrace {
            events: Vec::with_capacity(capacity.min(65_536)),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event
    pub fn record(&mut self, event: BusEvent) {
        if self.events.len() < self.capacity {
            self.events.push(event);
        } else {
            self.dropped += 1;
        }
    }

    /// Recorded events in order
    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    /// Events that did not fit
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Write the trace as CSV (`cycle,action,register,value`)
    #[cfg(feature = "bus-trace")]
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> crate::Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for event in &self.events {
            csv.serialize(event)
                .map_err(|e| format!("Failed to write trace row: {}", e))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Save the trace as a CSV file
    #[cfg(feature = "bus-trace")]
    pub fn save_csv<P: AsRef<std::path::Path>>(&self, path: P) -> crate::Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(cycle: u64, action: BusAction, value: u8) -> BusEvent {
        BusEvent {
            cycle,
            action,
            register: Some(8),
            value,
        }
    }

    #[test]
    fn test_trace_capacity() {
        let mut trace = BusTrace::with_capacity(2);
        trace.record(event(1, BusAction::Latch, 8));
        trace.record(event(2, BusAction::Write, 0x0F));
        trace.record(event(3, BusAction::Write, 0x00));
        assert_eq!(trace.events().len(), 2);
        assert_eq!(trace.dropped(), 1);
    }

    #[cfg(feature = "bus-trace")]
    #[test]
    fn test_csv_export() {
        let mut trace = BusTrace::with_capacity(4);
        trace.record(event(5, BusAction::Latch, 8));
        trace.record(event(9, BusAction::Write, 15));

        let mut out = Vec::new();
        trace.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "cycle,action,register,value");
        assert_eq!(lines[1], "5,Latch,8,8");
        assert_eq!(lines[2], "9,Write,8,15");
    }
}
