//! Peripheral bus between the microcontroller and the sound chip
//!
//! The 8051 talks to the AY-3-8910 through two ports: P1 carries the data bus
//! and three P3 pins carry the BC1/BDIR/BC2 control lines. The
//! [`PeripheralBridge`] watches writes to those ports and turns them into
//! latch/write/read cycles on a [`BusObserver`].

pub mod bridge;
pub mod trace;

pub use bridge::{BusAction, ControlLines, PeripheralBridge};
pub use trace::{BusEvent, BusTrace};

use parking_lot::Mutex;
use std::sync::Arc;

/// Receiver of sound-chip bus cycles
///
/// The sound chip is the only concrete implementation in this crate; the
/// trait exists so the bridge can be exercised with recording doubles.
pub trait BusObserver: Send {
    /// Select the register addressed by subsequent data cycles (low 4 bits)
    fn latch_address(&mut self, addr: u8);

    /// Store a byte into the latched register
    fn write_data(&mut self, value: u8);

    /// Read the latched register
    fn read_data(&mut self) -> u8;

    /// Store into register `reg` (low 4 bits) without a bus cycle.
    /// The latched address is left as it was.
    fn store_register(&mut self, reg: u8, value: u8);

    /// Read register `reg` (low 4 bits) without a bus cycle
    fn load_register(&mut self, reg: u8) -> u8;
}

impl<T: BusObserver> BusObserver for Arc<Mutex<T>> {
    fn latch_address(&mut self, addr: u8) {
        self.lock().latch_address(addr);
    }

    fn write_data(&mut self, value: u8) {
        self.lock().write_data(value);
    }

    fn read_data(&mut self) -> u8 {
        self.lock().read_data()
    }

    fn store_register(&mut self, reg: u8, value: u8) {
        self.lock().store_register(reg, value);
    }

    fn load_register(&mut self, reg: u8) -> u8 {
        self.lock().load_register(reg)
    }
}

/// Bus with nothing attached: writes vanish, reads float high
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl BusObserver for NullBus {
    fn latch_address(&mut self, _addr: u8) {}

    fn write_data(&mut self, _value: u8) {}

    fn read_data(&mut self) -> u8 {
        0xFF
    }

    fn store_register(&mut self, _reg: u8, _value: u8) {}

    fn load_register(&mut self, _reg: u8) -> u8 {
        0xFF
    }
}
