//! Special-Function Register Table
//!
//! Direct addresses 0x80-0xFF are looked up in a 128-entry handler table.
//! Each registered SFR supplies a read and a write function; unregistered
//! addresses fall through to plain internal RAM.

use crate::cpu::Cpu8051;

/// SFR addresses of the standard 8051 register set
pub mod addr {
    /// Port 0
    pub const P0: u8 = 0x80;
    /// Stack pointer
    pub const SP: u8 = 0x81;
    /// Data pointer low byte
    pub const DPL: u8 = 0x82;
    /// Data pointer high byte
    pub const DPH: u8 = 0x83;
    /// Power control
    pub const PCON: u8 = 0x87;
    /// Timer control
    pub const TCON: u8 = 0x88;
    /// Timer mode
    pub const TMOD: u8 = 0x89;
    /// Timer 0 low byte
    pub const TL0: u8 = 0x8A;
    /// Timer 1 low byte
    pub const TL1: u8 = 0x8B;
    /// Timer 0 high byte
    pub const TH0: u8 = 0x8C;
    /// Timer 1 high byte
    pub const TH1: u8 = 0x8D;
    /// Port 1 (sound chip data bus)
    pub const P1: u8 = 0x90;
    /// Serial control
    pub const SCON: u8 = 0x98;
    /// Serial data buffer
    pub const SBUF: u8 = 0x99;
    /// Port 2
    pub const P2: u8 = 0xA0;
    /// Interrupt enable
    pub const IE: u8 = 0xA8;
    /// Port 3 (sound chip control lines)
    pub const P3: u8 = 0xB0;
    /// Interrupt priority
    pub const IP: u8 = 0xB8;
    /// Program status word
    pub const PSW: u8 = 0xD0;
    /// Accumulator
    pub const ACC: u8 = 0xE0;
    /// B register
    pub const B: u8 = 0xF0;
}

/// SCON receive-interrupt flag
pub const SCON_RI: u8 = 0x01;
/// SCON transmit-interrupt flag
pub const SCON_TI: u8 = 0x02;

/// Read/write pair for one SFR address
#[derive(Clone, Copy)]
pub struct SfrHandler {
    /// Produce the value seen by a direct read
    pub read: fn(&Cpu8051, u8) -> u8,
    /// Apply a direct write, including any side effect
    pub write: fn(&mut Cpu8051, u8, u8),
}

impl SfrHandler {
    /// Handler that simply stores the byte in SFR storage
    pub const LATCH: SfrHandler = SfrHandler {
        read: read_latch,
        write: write_latch,
    };
}

impl std::fmt::Debug for SfrHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SfrHandler")
    }
}

/// Handler table indexed by `addr - 0x80`
#[derive(Debug, Clone)]
pub struct SfrTable {
    handlers: [Option<SfrHandler>; 128],
}

impl SfrTable {
    /// Table with no registered SFRs (every address is plain RAM)
    pub fn empty() -> Self {
        SfrTable {
            handlers: [None; 128],
        }
    }

    /// Table with the standard 8051 register set and the port/serial side effects
    pub fn standard() -> Self {
        let mut table = Self::empty();

        for latched in [
            addr::P0,
            addr::PCON,
            addr::TCON,
            addr::TMOD,
            addr::TL0,
            addr::TL1,
            addr::TH0,
            addr::TH1,
            addr::SCON,
            addr::P2,
            addr::IE,
            addr::IP,
        ] {
            table.register(latched, SfrHandler::LATCH);
        }

        table.register(
            addr::ACC,
            SfrHandler {
                read: |cpu, _| cpu.a,
                write: |cpu, _, v| cpu.a = v,
            },
        );
        table.register(
            addr::B,
            SfrHandler {
                read: |cpu, _| cpu.b,
                write: |cpu, _, v| cpu.b = v,
            },
        );
        table.register(
            addr::PSW,
            SfrHandler {
                read: |cpu, _| cpu.psw_value(),
                write: |cpu, _, v| cpu.set_psw_value(v),
            },
        );
        table.register(
            addr::SP,
            SfrHandler {
                read: |cpu, _| cpu.sp,
                write: |cpu, _, v| cpu.sp = v,
            },
        );
        table.register(
            addr::DPL,
            SfrHandler {
                read: |cpu, _| cpu.dptr as u8,
                write: |cpu, _, v| cpu.dptr = (cpu.dptr & 0xFF00) | v as u16,
            },
        );
        table.register(
            addr::DPH,
            SfrHandler {
                read: |cpu, _| (cpu.dptr >> 8) as u8,
                write: |cpu, _, v| cpu.dptr = (cpu.dptr & 0x00FF) | ((v as u16) << 8),
            },
        );
        table.register(
            addr::P1,
            SfrHandler {
                read: read_latch,
                write: write_port_a,
            },
        );
        table.register(
            addr::P3,
            SfrHandler {
                read: read_latch,
                write: write_port_b,
            },
        );
        table.register(
            addr::SBUF,
            SfrHandler {
                read: read_latch,
                write: write_sbuf,
            },
        );

        table
    }

    /// Install (or replace) the handler for `addr` (must be 0x80 or above)
    pub fn register(&mut self, addr: u8, handler: SfrHandler) {
        debug_assert!(addr >= super::SFR_BASE, "SFR address below 0x80");
        self.handlers[(addr & 0x7F) as usize] = Some(handler);
    }

    /// Remove a handler so the address falls back to plain RAM
    pub fn unregister(&mut self, addr: u8) {
        self.handlers[(addr & 0x7F) as usize] = None;
    }

    /// Handler for `addr`, if one is registered
    #[inline]
    pub fn get(&self, addr: u8) -> Option<SfrHandler> {
        self.handlers[(addr & 0x7F) as usize]
    }
}

impl Default for SfrTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn read_latch(cpu: &Cpu8051, addr: u8) -> u8 {
    cpu.mem.sfr_latch(addr)
}

fn write_latch(cpu: &mut Cpu8051, addr: u8, value: u8) {
    cpu.mem.set_sfr_latch(addr, value);
}

fn write_port_a(cpu: &mut Cpu8051, addr: u8, value: u8) {
    cpu.mem.set_sfr_latch(addr, value);
    let cycle = cpu.cycles();
    if let Some(read_back) = cpu.bridge.write_port_a(value, cycle) {
        cpu.mem.set_sfr_latch(addr, read_back);
    }
}

fn write_port_b(cpu: &mut Cpu8051, addr: u8, value: u8) {
    cpu.mem.set_sfr_latch(addr, value);
    let cycle = cpu.cycles();
    if let Some(read_back) = cpu.bridge.write_port_b(value, cycle) {
        cpu.mem.set_sfr_latch(addr::P1, read_back);
    }
}

// Firmware writes to SBUF go out on the transmit line; the receive side of
// SBUF is only loaded by `Cpu8051::uart_receive`.
fn write_sbuf(cpu: &mut Cpu8051, _addr: u8, value: u8) {
    cpu.bridge.transmit(value);
    let scon = cpu.mem.sfr_latch(addr::SCON);
    cpu.mem.set_sfr_latch(addr::SCON, scon | SCON_TI);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_registrations() {
        let table = SfrTable::standard();
        for a in [addr::P1, addr::P3, addr::SBUF, addr::SCON, addr::ACC, addr::PSW] {
            assert!(table.get(a).is_some(), "missing {a:02X}");
        }
        assert!(table.get(0x91).is_none());
        assert!(table.get(0xFF).is_none());
    }

    #[test]
    fn test_unregistered_sfr_falls_back_to_ram() {
        let mut cpu = Cpu8051::new();
        cpu.write_direct(0xC3, 0x5A);
        assert_eq!(cpu.read_direct(0xC3), 0x5A);
        assert_eq!(cpu.mem.iram(0xC3), 0x5A);
    }

    #[test]
    fn test_custom_handler_registration() {
        let mut cpu = Cpu8051::new();
        cpu.sfr.register(
            0xC0,
            SfrHandler {
                read: |_, _| 0x42,
                write: |cpu, _, v| cpu.b = v,
            },
        );
        cpu.write_direct(0xC0, 0x17);
        assert_eq!(cpu.b, 0x17);
        assert_eq!(cpu.read_direct(0xC0), 0x42);

        cpu.sfr.unregister(0xC0);
        cpu.write_direct(0xC0, 0x99);
        assert_eq!(cpu.read_direct(0xC0), 0x99);
    }

    #[test]
    fn test_dptr_halves() {
        let mut cpu = Cpu8051::new();
        cpu.write_direct(addr::DPH, 0x12);
        cpu.write_direct(addr::DPL, 0x34);
        assert_eq!(cpu.dptr, 0x1234);
        assert_eq!(cpu.read_direct(addr::DPL), 0x34);
    }

    #[test]
    fn test_sbuf_write_sets_ti_and_transmits() {
        let mut cpu = Cpu8051::new();
        cpu.write_direct(addr::SBUF, 0x7E);
        assert_ne!(cpu.read_direct(addr::SCON) & SCON_TI, 0);
        assert_eq!(cpu.bridge.transmitted(), &[0x7E]);
    }
}
