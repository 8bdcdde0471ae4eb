//! 8051 Memory Model
//!
//! Three independent address spaces:
//! - internal data (256 bytes), whose upper half is shadowed by special-function
//!   registers for direct addressing
//! - external data (64 KB), reached only through `MOVX`
//! - program space (64 KB), read-only to the firmware
//!
//! Working registers R0-R7 alias the first eight bytes of internal data.

pub mod sfr;

pub use sfr::{SfrHandler, SfrTable};

use crate::{Ay8051Error, Result};

/// Size of the internal data space
pub const IRAM_SIZE: usize = 256;

/// Size of the external data space
pub const XRAM_SIZE: usize = 0x1_0000;

/// Size of the program space
pub const CODE_SIZE: usize = 0x1_0000;

/// First direct address that is routed to the SFR table
pub const SFR_BASE: u8 = 0x80;

/// Byte location of a bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLocation {
    /// Direct byte address containing the bit
    pub byte: u8,
    /// Bit position within the byte (0-7)
    pub bit: u8,
}

impl BitLocation {
    /// Resolve a bit address (0-255) to its containing byte and bit position.
    ///
    /// Addresses below 0x80 map into the bit-addressable RAM at 0x20-0x2F;
    /// the rest fold into 0x80-0x8F (not the bit-addressable SFR columns).
    #[inline]
    pub fn resolve(bit_addr: u8) -> Self {
        let byte = if bit_addr < 0x80 {
            (bit_addr >> 3) | 0x20
        } else {
            0x80 + ((bit_addr >> 3) & 0x0F)
        };
        BitLocation {
            byte,
            bit: bit_addr & 0x07,
        }
    }

    /// Single-bit mask for this location
    #[inline]
    pub fn mask(&self) -> u8 {
        1 << self.bit
    }
}

/// Backing storage for all address spaces
#[derive(Clone)]
pub struct Memory {
    iram: [u8; IRAM_SIZE],
    sfr: [u8; 128],
    xram: Box<[u8]>,
    code: Box<[u8]>,
}

impl Memory {
    /// Create zeroed memory
    pub fn new() -> Self {
        Memory {
            iram: [0; IRAM_SIZE],
            sfr: [0; 128],
            xram: vec![0; XRAM_SIZE].into_boxed_slice(),
            code: vec![0; CODE_SIZE].into_boxed_slice(),
        }
    }

    /// Read internal data without SFR redirection (indirect addressing path)
    #[inline]
    pub fn iram(&self, addr: u8) -> u8 {
        self.iram[addr as usize]
    }

    /// Write internal data without SFR redirection
    #[inline]
    pub fn set_iram(&mut self, addr: u8, value: u8) {
        self.iram[addr as usize] = value;
    }

    /// Storage cell of a latched SFR
    #[inline]
    pub fn sfr_latch(&self, addr: u8) -> u8 {
        self.sfr[(addr & 0x7F) as usize]
    }

    /// Update the storage cell of a latched SFR
    #[inline]
    pub fn set_sfr_latch(&mut self, addr: u8, value: u8) {
        self.sfr[(addr & 0x7F) as usize] = value;
    }

    /// Read external data
    #[inline]
    pub fn xram(&self, addr: u16) -> u8 {
        self.xram[addr as usize]
    }

    /// Write external data
    #[inline]
    pub fn set_xram(&mut self, addr: u16, value: u8) {
        self.xram[addr as usize] = value;
    }

    /// Fetch a program byte
    #[inline]
    pub fn code(&self, addr: u16) -> u8 {
        self.code[addr as usize]
    }

    /// Copy a firmware image into program space at `offset`.
    ///
    /// The image is loaded verbatim: no header, no relocation.
    pub fn load_code(&mut self, image: &[u8], offset: u16) -> Result<()> {
        let start = offset as usize;
        let end = start + image.len();
        if end > CODE_SIZE {
            return Err(Ay8051Error::FirmwareError(format!(
                "image of {} bytes at 0x{:04X} exceeds the 64 KB program space",
                image.len(),
                offset
            )));
        }
        self.code[start..end].copy_from_slice(image);
        Ok(())
    }

    /// Clear internal data, SFR storage and external data (program space is kept)
    pub fn clear_data(&mut self) {
        self.iram = [0; IRAM_SIZE];
        self.sfr = [0; 128];
        self.xram.fill(0);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("iram", &&self.iram[..0x30])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_resolution_low_range() {
        for bit in 0u8..0x80 {
            let loc = BitLocation::resolve(bit);
            assert!((0x20..=0x2F).contains(&loc.byte), "bit {bit:02X}");
            assert_eq!(loc.bit, bit & 7);
        }
        assert_eq!(BitLocation::resolve(0x00).byte, 0x20);
        assert_eq!(BitLocation::resolve(0x7F).byte, 0x2F);
    }

    #[test]
    fn test_bit_resolution_sfr_range() {
        for bit in 0x80u8..=0xFF {
            let loc = BitLocation::resolve(bit);
            assert!((0x80..=0x8F).contains(&loc.byte), "bit {bit:02X}");
            assert_eq!(loc.bit, bit & 7);
        }
        assert_eq!(BitLocation::resolve(0x80), BitLocation { byte: 0x80, bit: 0 });
        assert_eq!(BitLocation::resolve(0x90), BitLocation { byte: 0x82, bit: 0 });
        assert_eq!(BitLocation::resolve(0xB4), BitLocation { byte: 0x86, bit: 4 });
        assert_eq!(BitLocation::resolve(0xFF), BitLocation { byte: 0x8F, bit: 7 });
    }

    #[test]
    fn test_bit_resolution_is_stable() {
        for bit in 0u8..=0xFF {
            assert_eq!(BitLocation::resolve(bit), BitLocation::resolve(bit));
        }
    }

    #[test]
    fn test_load_code_bounds() {
        let mut mem = Memory::new();
        mem.load_code(&[0x12, 0x34], 0xFFFE).unwrap();
        assert_eq!(mem.code(0xFFFF), 0x34);
        assert!(mem.load_code(&[0; 3], 0xFFFE).is_err());
    }

    #[test]
    fn test_sfr_storage_is_separate_from_upper_iram() {
        let mut mem = Memory::new();
        mem.set_iram(0x90, 0x11);
        mem.set_sfr_latch(0x90, 0x22);
        assert_eq!(mem.iram(0x90), 0x11);
        assert_eq!(mem.sfr_latch(0x90), 0x22);
    }
}
