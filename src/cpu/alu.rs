//! Arithmetic helpers and PSW flag bits
//!
//! Each helper takes the operands plus the incoming PSW and returns the result
//! byte together with the updated PSW.

use bitflags::bitflags;

bitflags! {
    /// Program status word (0xD0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Psw: u8 {
        /// Carry
        const CY = 0x80;
        /// Auxiliary carry (nibble)
        const AC = 0x40;
        /// User flag 0
        const F0 = 0x20;
        /// Register bank select 1
        const RS1 = 0x10;
        /// Register bank select 0
        const RS0 = 0x08;
        /// Overflow
        const OV = 0x04;
        /// User flag 1
        const F1 = 0x02;
        /// Parity of the accumulator
        const P = 0x01;
    }
}

/// Carry out of an 8-bit operation, taken from the raw (possibly negative)
/// result as `((r >> 1) | (r >> 8)) & 0x80`.
#[inline]
fn carry_from_raw(raw: i32) -> bool {
    ((raw >> 1) | (raw >> 8)) & 0x80 != 0
}

/// `ADD`/`ADDC`: returns (sum, psw)
pub fn add(a: u8, operand: u8, carry_in: bool, psw: u8) -> (u8, u8) {
    let c = carry_in as i32;
    let raw = a as i32 + operand as i32 + c;
    let result = raw as u8;

    let mut flags = Psw::from_bits_retain(psw);
    flags.set(Psw::CY, carry_from_raw(raw));
    flags.set(Psw::AC, (a & 0x0F) as i32 + (operand & 0x0F) as i32 + c > 0x0F);
    flags.set(Psw::OV, (a ^ result) & (operand ^ result) & 0x80 != 0);
    (result, flags.bits())
}

/// `SUBB`: returns (difference, psw)
pub fn subb(a: u8, operand: u8, borrow_in: bool, psw: u8) -> (u8, u8) {
    let c = borrow_in as i32;
    let raw = a as i32 - operand as i32 - c;
    let result = raw as u8;

    let mut flags = Psw::from_bits_retain(psw);
    flags.set(Psw::CY, carry_from_raw(raw));
    flags.set(Psw::AC, ((a & 0x0F) as i32) < (operand & 0x0F) as i32 + c);
    flags.set(Psw::OV, (a ^ operand) & (a ^ result) & 0x80 != 0);
    (result, flags.bits())
}

/// `DA A`: decimal adjust after a BCD addition. Carry is only ever set.
pub fn decimal_adjust(a: u8, psw: u8) -> (u8, u8) {
    let mut flags = Psw::from_bits_retain(psw);
    let mut value = a as u16;

    if (value & 0x0F) > 9 || flags.contains(Psw::AC) {
        value += 0x06;
        if value > 0xFF {
            flags.insert(Psw::CY);
        }
    }
    if ((value >> 4) & 0x0F) > 9 || flags.contains(Psw::CY) {
        value += 0x60;
        flags.insert(Psw::CY);
    }
    (value as u8, flags.bits())
}

/// `MUL AB`: returns (low, high, psw). OV set when the product exceeds 255, CY cleared.
pub fn multiply(a: u8, b: u8, psw: u8) -> (u8, u8, u8) {
    let product = a as u16 * b as u16;
    let mut flags = Psw::from_bits_retain(psw);
    flags.remove(Psw::CY);
    flags.set(Psw::OV, product > 0xFF);
    (product as u8, (product >> 8) as u8, flags.bits())
}

/// `DIV AB`: returns (quotient, remainder, psw).
///
/// Division by zero leaves A and B as they were, sets OV and clears CY.
pub fn divide(a: u8, b: u8, psw: u8) -> (u8, u8, u8) {
    let mut flags = Psw::from_bits_retain(psw);
    flags.remove(Psw::CY);
    if b == 0 {
        flags.insert(Psw::OV);
        return (a, b, flags.bits());
    }
    flags.remove(Psw::OV);
    (a / b, a % b, flags.bits())
}

/// Even-parity bit of the accumulator (1 when the number of set bits is odd)
#[inline]
pub fn parity(a: u8) -> bool {
    a.count_ones() % 2 == 1
}
