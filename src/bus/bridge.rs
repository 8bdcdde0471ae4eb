//! Port-to-chip bridge
//!
//! Mirrors the wiring of the sound board: P1 is the AY data bus, P3.0 is BC1,
//! P3.4 is BDIR and P3.5 is BC2. Every write to either port re-evaluates the
//! control lines and performs at most one bus cycle.

use super::trace::{BusEvent, BusTrace};
use super::{BusObserver, NullBus};
use crate::protocol::{Command, CommandFramer, Frame};
use bitflags::bitflags;
use log::{debug, trace, warn};
use std::sync::Arc;

/// Bytes kept in the transmit log before the oldest half is discarded
const TX_LOG_CAPACITY: usize = 4096;

bitflags! {
    /// Control pins of the sound chip as wired onto port B (P3)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlLines: u8 {
        /// Bus control 1 (P3.0)
        const BC1 = 0x01;
        /// Bus direction (P3.4)
        const BDIR = 0x10;
        /// Bus control 2 (P3.5)
        const BC2 = 0x20;
    }
}

/// Bus cycle selected by the control lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BusAction {
    /// No bus cycle
    Inactive,
    /// Latched register is driven onto the data bus
    Read,
    /// Data bus is stored into the latched register
    Write,
    /// Data bus selects the register index
    Latch,
}

impl BusAction {
    /// Decode the (BDIR, BC2, BC1) combination present on `port_b`.
    ///
    /// | BDIR | BC2 | BC1 | action   |
    /// |------|-----|-----|----------|
    /// | 0    | 1   | 1   | read     |
    /// | 1    | 1   | 0   | write    |
    /// | 1    | 1   | 1   | latch    |
    ///
    /// Every other combination is inactive.
    pub fn decode(port_b: u8) -> Self {
        let lines = ControlLines::from_bits_truncate(port_b);
        let bdir = lines.contains(ControlLines::BDIR);
        let bc2 = lines.contains(ControlLines::BC2);
        let bc1 = lines.contains(ControlLines::BC1);
        match (bdir, bc2, bc1) {
            (false, true, true) => BusAction::Read,
            (true, true, false) => BusAction::Write,
            (true, true, true) => BusAction::Latch,
            _ => BusAction::Inactive,
        }
    }
}

/// Translates port and serial activity into sound-chip and framer effects
pub struct PeripheralBridge {
    observer: Box<dyn BusObserver>,
    framer: Arc<CommandFramer>,
    dispatch_frames: bool,
    bus_data: u8,
    port_b: u8,
    selected: Option<u8>,
    tx_log: Vec<u8>,
    trace: Option<BusTrace>,
}

impl PeripheralBridge {
    /// Bridge driving `observer`, feeding received serial bytes into `framer`
    pub fn new(observer: Box<dyn BusObserver>, framer: Arc<CommandFramer>) -> Self {
        PeripheralBridge {
            observer,
            framer,
            dispatch_frames: true,
            bus_data: 0xFF,
            port_b: 0xFF,
            selected: None,
            tx_log: Vec::new(),
            trace: None,
        }
    }

    /// Bridge with nothing attached (bare interpreter use)
    pub fn detached() -> Self {
        Self::new(Box::new(NullBus), Arc::new(CommandFramer::new()))
    }

    /// Enable or disable applying completed frames directly to the chip
    pub fn set_dispatch_frames(&mut self, enabled: bool) {
        self.dispatch_frames = enabled;
    }

    /// Whether completed frames are applied to the chip
    pub fn dispatch_frames(&self) -> bool {
        self.dispatch_frames
    }

    /// Framer fed by the serial receive path
    pub fn framer(&self) -> &Arc<CommandFramer> {
        &self.framer
    }

    /// Current data bus value (last P1 write)
    pub fn bus_data(&self) -> u8 {
        self.bus_data
    }

    /// Current control-line byte (last P3 write)
    pub fn port_b(&self) -> u8 {
        self.port_b
    }

    /// Port A written: latch bus data and re-evaluate the control lines.
    ///
    /// Returns the byte the chip drove back onto port A for a read cycle.
    pub fn write_port_a(&mut self, value: u8, cycle: u64) -> Option<u8> {
        self.bus_data = value;
        self.evaluate(cycle)
    }

    /// Port B written: update the control lines and re-evaluate.
    ///
    /// Returns the byte the chip drove back onto port A for a read cycle.
    pub fn write_port_b(&mut self, value: u8, cycle: u64) -> Option<u8> {
        self.port_b = value;
        self.evaluate(cycle)
    }

    fn evaluate(&mut self, cycle: u64) -> Option<u8> {
        let action = BusAction::decode(self.port_b);
        let (register, value, read_back) = match action {
            BusAction::Inactive => return None,
            BusAction::Latch => {
                let index = self.bus_data & 0x0F;
                self.selected = Some(index);
                self.observer.latch_address(index);
                (Some(index), index, None)
            }
            BusAction::Write => {
                self.observer.write_data(self.bus_data);
                (self.selected, self.bus_data, None)
            }
            BusAction::Read => {
                let value = self.observer.read_data();
                (self.selected, value, Some(value))
            }
        };

        trace!("bus {:?} reg={:?} value={:02X}", action, register, value);
        if let Some(log) = self.trace.as_mut() {
            log.record(BusEvent {
                cycle,
                action,
                register,
                value,
            });
        }
        read_back
    }

    /// A byte arrived on the serial line: feed it to the framer and, when a
    /// frame completes, optionally apply it to the chip.
    pub fn serial_received(&mut self, byte: u8) -> Option<Frame> {
        let frame = self.framer.feed(byte)?;
        debug!(
            "frame complete: start={:02X} command={:02X} payload={:02X?}",
            frame.start, frame.command, frame.payload
        );

        if self.dispatch_frames {
            match Command::decode(&frame) {
                Ok(command) => {
                    command.apply(self.observer.as_mut());
                    self.framer.record_dispatch(None);
                }
                Err(fault) => {
                    warn!("command frame discarded: {}", fault);
                    self.framer.record_dispatch(Some(&fault));
                }
            }
        }
        Some(frame)
    }

    /// Firmware wrote SBUF
    pub fn transmit(&mut self, byte: u8) {
        if self.tx_log.len() >= TX_LOG_CAPACITY {
            self.tx_log.drain(..TX_LOG_CAPACITY / 2);
        }
        self.tx_log.push(byte);
    }

    /// Bytes transmitted by the firmware, oldest first
    pub fn transmitted(&self) -> &[u8] {
        &self.tx_log
    }

    /// Drain the transmit log
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx_log)
    }

    /// Start recording bus cycles (keeps at most `capacity` events)
    pub fn enable_trace(&mut self, capacity: usize) {
        self.trace = Some(BusTrace::with_capacity(capacity));
    }

    /// Stop recording and return what was captured
    pub fn take_trace(&mut self) -> Option<BusTrace> {
        self.trace.take()
    }

    /// Recorded bus cycles so far
    pub fn trace(&self) -> Option<&BusTrace> {
        self.trace.as_ref()
    }
}

impl std::fmt::Debug for PeripheralBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralBridge")
            .field("bus_data", &self.bus_data)
            .field("port_b", &self.port_b)
            .field("selected", &self.selected)
            .field("dispatch_frames", &self.dispatch_frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ay38910::Ay38910;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        log: Vec<String>,
        regs: [u8; 16],
        latched: u8,
    }

    impl BusObserver for Recorder {
        fn latch_address(&mut self, addr: u8) {
            self.latched = addr;
            self.log.push(format!("latch {addr:X}"));
        }

        fn write_data(&mut self, value: u8) {
            self.regs[self.latched as usize] = value;
            self.log.push(format!("write {value:02X}"));
        }

        fn read_data(&mut self) -> u8 {
            self.log.push("read".into());
            self.regs[self.latched as usize]
        }

        fn store_register(&mut self, reg: u8, value: u8) {
            self.regs[(reg & 0x0F) as usize] = value;
            self.log.push(format!("store {reg:X}={value:02X}"));
        }

        fn load_register(&mut self, reg: u8) -> u8 {
            self.regs[(reg & 0x0F) as usize]
        }
    }

    fn bridge() -> (PeripheralBridge, Arc<Mutex<Recorder>>) {
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let bridge = PeripheralBridge::new(
            Box::new(Arc::clone(&recorder)),
            Arc::new(CommandFramer::new()),
        );
        (bridge, recorder)
    }

    #[test]
    fn test_control_truth_table() {
        // (BDIR, BC2, BC1) for all eight combinations
        for bits in 0u8..8 {
            let bdir = bits & 4 != 0;
            let bc2 = bits & 2 != 0;
            let bc1 = bits & 1 != 0;
            let port = (bdir as u8) << 4 | (bc2 as u8) << 5 | bc1 as u8;
            let expected = match (bdir, bc2, bc1) {
                (false, true, true) => BusAction::Read,
                (true, true, false) => BusAction::Write,
                (true, true, true) => BusAction::Latch,
                _ => BusAction::Inactive,
            };
            assert_eq!(BusAction::decode(port), expected, "lines {bits:03b}");
        }
    }

    #[test]
    fn test_unrelated_port_b_bits_are_ignored() {
        assert_eq!(BusAction::decode(0x31 | 0xCE), BusAction::Latch);
        assert_eq!(BusAction::decode(0x20 | 0xC0), BusAction::Inactive);
    }

    #[test]
    fn test_latch_then_write_sequence() {
        let (mut bridge, recorder) = bridge();

        bridge.write_port_b(0x20, 0); // inactive
        bridge.write_port_a(0x18, 0); // index masked to 8
        bridge.write_port_b(0x31, 0); // latch
        bridge.write_port_b(0x20, 0);
        bridge.write_port_a(0x0F, 0);
        bridge.write_port_b(0x30, 0); // write

        let rec = recorder.lock();
        assert_eq!(rec.log, vec!["latch 8", "write 0F"]);
        assert_eq!(rec.regs[8], 0x0F);
    }

    #[test]
    fn test_read_cycle_returns_register() {
        let (mut bridge, recorder) = bridge();
        recorder.lock().regs[3] = 0x0A;

        bridge.write_port_a(0x03, 0);
        bridge.write_port_b(0x31, 0);
        assert_eq!(bridge.write_port_b(0x21, 0), Some(0x0A));
    }

    #[test]
    fn test_port_a_write_reevaluates_in_write_mode() {
        let (mut bridge, recorder) = bridge();
        bridge.write_port_a(0x01, 0);
        bridge.write_port_b(0x31, 0);
        bridge.write_port_b(0x30, 0);
        bridge.write_port_a(0x55, 0);
        assert_eq!(recorder.lock().regs[1], 0x55);
    }

    #[test]
    fn test_trace_records_cycles() {
        let (mut bridge, _) = bridge();
        bridge.enable_trace(16);
        bridge.write_port_a(0x07, 10);
        bridge.write_port_b(0x31, 12);
        bridge.write_port_b(0x20, 14);

        let trace = bridge.take_trace().unwrap();
        assert_eq!(trace.events().len(), 1);
        assert_eq!(trace.events()[0].cycle, 12);
        assert_eq!(trace.events()[0].action, BusAction::Latch);
        assert_eq!(trace.events()[0].register, Some(7));
    }

    #[test]
    fn test_serial_frame_dispatches_to_observer() {
        let (mut bridge, recorder) = bridge();
        let mut frames = Vec::new();
        for byte in [0xB5, 0xA4, 0x01, 0x34, 0x02, 0x0C, 0xB0] {
            if let Some(frame) = bridge.serial_received(byte) {
                frames.push(frame);
            }
        }
        assert_eq!(frames.len(), 1);
        let rec = recorder.lock();
        assert_eq!(rec.regs[2], 0x34);
        assert_eq!(rec.regs[3], 0x02);
        assert_eq!(rec.regs[9], 0x0C);
    }

    #[test]
    fn test_frame_between_latch_and_write() {
        let chip = Arc::new(Mutex::new(Ay38910::new()));
        let mut bridge =
            PeripheralBridge::new(Box::new(Arc::clone(&chip)), Arc::new(CommandFramer::new()));
        bridge.enable_trace(16);

        // Firmware selects R8
        bridge.write_port_b(0x20, 0);
        bridge.write_port_a(0x08, 1);
        bridge.write_port_b(0x31, 2);
        bridge.write_port_b(0x20, 3);

        for byte in [0xB5, 0xA4, 0x02, 0x00, 0x02, 0x08, 0xB0, 0xB5, 0xA6, 0xB0] {
            bridge.serial_received(byte);
        }
        assert_eq!(bridge.framer().stats().dispatched, 2);

        // Firmware completes its write
        bridge.write_port_a(0x0C, 4);
        bridge.write_port_b(0x30, 5);

        let chip = chip.lock();
        assert_eq!(chip.latched(), Some(8));
        assert_eq!(chip.amplitude(0), 0x0C);
        assert_eq!(chip.amplitude(2), 0);
        assert_eq!(chip.tone_period(2), 0x200);

        let trace = bridge.take_trace().unwrap();
        let write = trace.events().last().unwrap();
        assert_eq!(write.action, BusAction::Write);
        assert_eq!(write.register, Some(8));
        assert_eq!(write.value, 0x0C);
    }

    #[test]
    fn test_serial_frame_without_dispatch() {
        let (mut bridge, recorder) = bridge();
        bridge.set_dispatch_frames(false);
        for byte in [0xB5, 0xA6, 0xB0] {
            bridge.serial_received(byte);
        }
        assert!(recorder.lock().log.is_empty());
        assert_eq!(bridge.framer().stats().frames, 1);
    }

    #[test]
    fn test_transmit_log_is_bounded() {
        let mut bridge = PeripheralBridge::detached();
        for i in 0..(TX_LOG_CAPACITY + 10) {
            bridge.transmit(i as u8);
        }
        assert!(bridge.transmitted().len() <= TX_LOG_CAPACITY);
        assert_eq!(*bridge.transmitted().last().unwrap(), (TX_LOG_CAPACITY + 9) as u8);
    }
}
