//! Opcode descriptor table
//!
//! Every one of the 256 opcodes maps to an [`OpInfo`]: the operation kind with
//! its addressing modes, the encoded length and the machine-cycle cost. The
//! table is built at compile time so the interpreter's dispatch is one index.

/// Operand addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The accumulator
    A,
    /// Direct byte address (one operand byte, SFR-redirected above 0x7F)
    Direct,
    /// `@R0` / `@R1`: internal data addressed by a working register
    Indirect(u8),
    /// Working register `R0`-`R7`
    Reg(u8),
    /// Immediate byte
    Imm,
}

/// Operation kind
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    /// 11-bit jump within the current 2 KB page
    Ajmp,
    /// 11-bit call within the current 2 KB page
    Acall,
    Ljmp,
    Lcall,
    Sjmp,
    /// `JMP @A+DPTR`
    JmpIndirect,
    Ret,
    Reti,
    Rr,
    Rrc,
    Rl,
    Rlc,
    Swap,
    /// `DA A`
    Da,
    ClrA,
    CplA,
    Inc(Operand),
    Dec(Operand),
    IncDptr,
    Add(Operand),
    Addc(Operand),
    Subb(Operand),
    /// `ORL dst, src`
    Orl(Operand, Operand),
    /// `ANL dst, src`
    Anl(Operand, Operand),
    /// `XRL dst, src`
    Xrl(Operand, Operand),
    /// `ORL C, bit` or `ORL C, /bit`
    OrlC { complement: bool },
    /// `ANL C, bit` or `ANL C, /bit`
    AnlC { complement: bool },
    Jbc,
    Jb,
    Jnb,
    Jc,
    Jnc,
    Jz,
    Jnz,
    /// `MOV dst, src`
    Mov(Operand, Operand),
    /// `MOV direct, direct` (source byte is encoded first)
    MovDirectDirect,
    /// `MOV DPTR, #imm16`
    MovDptr,
    /// `MOVC A, @A+DPTR`
    MovcDptr,
    /// `MOVC A, @A+PC`
    MovcPc,
    /// `MOVX A, @DPTR`
    MovxReadDptr,
    /// `MOVX A, @Ri`
    MovxReadIndirect(u8),
    /// `MOVX @DPTR, A`
    MovxWriteDptr,
    /// `MOVX @Ri, A`
    MovxWriteIndirect(u8),
    /// `MOV C, bit`
    MovCBit,
    /// `MOV bit, C`
    MovBitC,
    ClrBit,
    ClrC,
    SetbBit,
    SetbC,
    CplBit,
    CplC,
    Mul,
    Div,
    /// `CJNE lhs, rhs, rel`
    Cjne(Operand, Operand),
    Djnz(Operand),
    Push,
    Pop,
    /// `XCH A, operand`
    Xch(Operand),
    /// `XCHD A, @Ri`
    Xchd(u8),
    /// No defined behavior
    Undefined,
}

/// Descriptor for one opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    /// Operation and addressing
    pub op: Op,
    /// Encoded length in bytes, opcode included
    pub len: u8,
    /// Machine cycles
    pub cycles: u8,
    /// Assembler mnemonic
    pub mnemonic: &'static str,
}

impl OpInfo {
    const UNDEFINED: OpInfo = info(Op::Undefined, 1, 1, "???");
}

const fn info(op: Op, len: u8, cycles: u8, mnemonic: &'static str) -> OpInfo {
    OpInfo {
        op,
        len,
        cycles,
        mnemonic,
    }
}

/// Source operand selected by the low nibble of the regular arithmetic/logic
/// columns (0x4 = immediate, 0x5 = direct, 0x6-0x7 = @Ri, 0x8-0xF = Rn)
const fn column(opcode: u8) -> Operand {
    match opcode & 0x0F {
        0x04 => Operand::Imm,
        0x05 => Operand::Direct,
        0x06 | 0x07 => Operand::Indirect(opcode & 0x01),
        _ => Operand::Reg(opcode & 0x07),
    }
}

/// Bytes contributed by an operand
const fn operand_len(operand: Operand) -> u8 {
    match operand {
        Operand::Direct | Operand::Imm => 1,
        _ => 0,
    }
}

/// Row families sharing the regular column layout
#[derive(Clone, Copy)]
enum Row {
    Orl,
    Anl,
    Xrl,
    Add,
    Addc,
    Subb,
    Inc,
    Dec,
}

const fn logic_op(row: Row, dst: Operand, src: Operand) -> Op {
    match row {
        Row::Anl => Op::Anl(dst, src),
        Row::Xrl => Op::Xrl(dst, src),
        _ => Op::Orl(dst, src),
    }
}

const fn unary_op(row: Row, operand: Operand) -> Op {
    match row {
        Row::Addc => Op::Addc(operand),
        Row::Subb => Op::Subb(operand),
        Row::Inc => Op::Inc(operand),
        Row::Dec => Op::Dec(operand),
        _ => Op::Add(operand),
    }
}

/// `ORL`/`ANL`/`XRL` rows share one layout
const fn logic(opcode: u8, row: Row, mnemonic: &'static str) -> OpInfo {
    match opcode & 0x0F {
        0x02 => info(logic_op(row, Operand::Direct, Operand::A), 2, 1, mnemonic),
        0x03 => info(logic_op(row, Operand::Direct, Operand::Imm), 3, 2, mnemonic),
        _ => {
            let src = column(opcode);
            info(logic_op(row, Operand::A, src), 1 + operand_len(src), 1, mnemonic)
        }
    }
}

/// `ADD`/`ADDC`/`SUBB` rows share one layout
const fn arith(opcode: u8, row: Row, mnemonic: &'static str) -> OpInfo {
    let src = column(opcode);
    info(unary_op(row, src), 1 + operand_len(src), 1, mnemonic)
}

/// `INC`/`DEC` rows: column 0x4 is the accumulator instead of an immediate
const fn step_op(opcode: u8, row: Row, mnemonic: &'static str) -> OpInfo {
    let target = match opcode & 0x0F {
        0x04 => Operand::A,
        _ => column(opcode),
    };
    info(unary_op(row, target), 1 + operand_len(target), 1, mnemonic)
}

const fn decode(opcode: u8) -> OpInfo {
    let ri = opcode & 0x01;
    let rn = opcode & 0x07;

    match opcode {
        // Page-relative jumps and calls occupy column 1 of every row
        o if o & 0x1F == 0x01 => info(Op::Ajmp, 2, 2, "AJMP"),
        o if o & 0x1F == 0x11 => info(Op::Acall, 2, 2, "ACALL"),

        0x00 => info(Op::Nop, 1, 1, "NOP"),
        0x02 => info(Op::Ljmp, 3, 2, "LJMP"),
        0x03 => info(Op::Rr, 1, 1, "RR"),
        0x04..=0x0F => step_op(opcode, Row::Inc, "INC"),

        0x10 => info(Op::Jbc, 3, 2, "JBC"),
        0x12 => info(Op::Lcall, 3, 2, "LCALL"),
        0x13 => info(Op::Rrc, 1, 1, "RRC"),
        0x14..=0x1F => step_op(opcode, Row::Dec, "DEC"),

        0x20 => info(Op::Jb, 3, 2, "JB"),
        0x22 => info(Op::Ret, 1, 2, "RET"),
        0x23 => info(Op::Rl, 1, 1, "RL"),
        0x24..=0x2F => arith(opcode, Row::Add, "ADD"),

        0x30 => info(Op::Jnb, 3, 2, "JNB"),
        0x32 => info(Op::Reti, 1, 2, "RETI"),
        0x33 => info(Op::Rlc, 1, 1, "RLC"),
        0x34..=0x3F => arith(opcode, Row::Addc, "ADDC"),

        0x40 => info(Op::Jc, 2, 2, "JC"),
        0x42..=0x4F => logic(opcode, Row::Orl, "ORL"),

        0x50 => info(Op::Jnc, 2, 2, "JNC"),
        0x52..=0x5F => logic(opcode, Row::Anl, "ANL"),

        0x60 => info(Op::Jz, 2, 2, "JZ"),
        0x62..=0x6F => logic(opcode, Row::Xrl, "XRL"),

        0x70 => info(Op::Jnz, 2, 2, "JNZ"),
        0x72 => info(Op::OrlC { complement: false }, 2, 2, "ORL"),
        0x73 => info(Op::JmpIndirect, 1, 2, "JMP"),
        0x74 => info(Op::Mov(Operand::A, Operand::Imm), 2, 1, "MOV"),
        0x75 => info(Op::Mov(Operand::Direct, Operand::Imm), 3, 2, "MOV"),
        0x76 | 0x77 => info(Op::Mov(Operand::Indirect(ri), Operand::Imm), 2, 1, "MOV"),
        0x78..=0x7F => info(Op::Mov(Operand::Reg(rn), Operand::Imm), 2, 1, "MOV"),

        0x80 => info(Op::Sjmp, 2, 2, "SJMP"),
        0x82 => info(Op::AnlC { complement: false }, 2, 2, "ANL"),
        0x83 => info(Op::MovcPc, 1, 2, "MOVC"),
        0x84 => info(Op::Div, 1, 4, "DIV"),
        0x85 => info(Op::MovDirectDirect, 3, 2, "MOV"),
        0x86 | 0x87 => info(Op::Mov(Operand::Direct, Operand::Indirect(ri)), 2, 2, "MOV"),
        0x88..=0x8F => info(Op::Mov(Operand::Direct, Operand::Reg(rn)), 2, 2, "MOV"),

        0x90 => info(Op::MovDptr, 3, 2, "MOV"),
        0x92 => info(Op::MovBitC, 2, 2, "MOV"),
        0x93 => info(Op::MovcDptr, 1, 2, "MOVC"),
        0x94..=0x9F => arith(opcode, Row::Subb, "SUBB"),

        0xA0 => info(Op::OrlC { complement: true }, 2, 2, "ORL"),
        0xA2 => info(Op::MovCBit, 2, 1, "MOV"),
        0xA3 => info(Op::IncDptr, 1, 2, "INC"),
        0xA4 => info(Op::Mul, 1, 4, "MUL"),
        0xA5 => OpInfo::UNDEFINED,
        0xA6 | 0xA7 => info(Op::Mov(Operand::Indirect(ri), Operand::Direct), 2, 2, "MOV"),
        0xA8..=0xAF => info(Op::Mov(Operand::Reg(rn), Operand::Direct), 2, 2, "MOV"),

        0xB0 => info(Op::AnlC { complement: true }, 2, 2, "ANL"),
        0xB2 => info(Op::CplBit, 2, 1, "CPL"),
        0xB3 => info(Op::CplC, 1, 1, "CPL"),
        0xB4 => info(Op::Cjne(Operand::A, Operand::Imm), 3, 2, "CJNE"),
        0xB5 => info(Op::Cjne(Operand::A, Operand::Direct), 3, 2, "CJNE"),
        0xB6 | 0xB7 => info(Op::Cjne(Operand::Indirect(ri), Operand::Imm), 3, 2, "CJNE"),
        0xB8..=0xBF => info(Op::Cjne(Operand::Reg(rn), Operand::Imm), 3, 2, "CJNE"),

        0xC0 => info(Op::Push, 2, 2, "PUSH"),
        0xC2 => info(Op::ClrBit, 2, 1, "CLR"),
        0xC3 => info(Op::ClrC, 1, 1, "CLR"),
        0xC4 => info(Op::Swap, 1, 1, "SWAP"),
        0xC5 => info(Op::Xch(Operand::Direct), 2, 1, "XCH"),
        0xC6 | 0xC7 => info(Op::Xch(Operand::Indirect(ri)), 1, 1, "XCH"),
        0xC8..=0xCF => info(Op::Xch(Operand::Reg(rn)), 1, 1, "XCH"),

        0xD0 => info(Op::Pop, 2, 2, "POP"),
        0xD2 => info(Op::SetbBit, 2, 1, "SETB"),
        0xD3 => info(Op::SetbC, 1, 1, "SETB"),
        0xD4 => info(Op::Da, 1, 1, "DA"),
        0xD5 => info(Op::Djnz(Operand::Direct), 3, 2, "DJNZ"),
        0xD6 | 0xD7 => info(Op::Xchd(ri), 1, 1, "XCHD"),
        0xD8..=0xDF => info(Op::Djnz(Operand::Reg(rn)), 2, 2, "DJNZ"),

        0xE0 => info(Op::MovxReadDptr, 1, 2, "MOVX"),
        0xE2 | 0xE3 => info(Op::MovxReadIndirect(ri), 1, 2, "MOVX"),
        0xE4 => info(Op::ClrA, 1, 1, "CLR"),
        0xE5 => info(Op::Mov(Operand::A, Operand::Direct), 2, 1, "MOV"),
        0xE6 | 0xE7 => info(Op::Mov(Operand::A, Operand::Indirect(ri)), 1, 1, "MOV"),
        0xE8..=0xEF => info(Op::Mov(Operand::A, Operand::Reg(rn)), 1, 1, "MOV"),

        0xF0 => info(Op::MovxWriteDptr, 1, 2, "MOVX"),
        0xF2 | 0xF3 => info(Op::MovxWriteIndirect(ri), 1, 2, "MOVX"),
        0xF4 => info(Op::CplA, 1, 1, "CPL"),
        0xF5 => info(Op::Mov(Operand::Direct, Operand::A), 2, 1, "MOV"),
        0xF6 | 0xF7 => info(Op::Mov(Operand::Indirect(ri), Operand::A), 1, 1, "MOV"),
        0xF8..=0xFF => info(Op::Mov(Operand::Reg(rn), Operand::A), 1, 1, "MOV"),

        _ => OpInfo::UNDEFINED,
    }
}

const fn build() -> [OpInfo; 256] {
    let mut table = [OpInfo::UNDEFINED; 256];
    let mut opcode = 0;
    while opcode < 256 {
        table[opcode] = decode(opcode as u8);
        opcode += 1;
    }
    table
}

/// Descriptor table indexed by opcode
pub static OPCODES: [OpInfo; 256] = build();

/// Descriptor for `opcode`
#[inline]
pub fn lookup(opcode: u8) -> &'static OpInfo {
    &OPCODES[opcode as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_a5_is_undefined() {
        let undefined: Vec<usize> = OPCODES
            .iter()
            .enumerate()
            .filter(|(_, info)| info.op == Op::Undefined)
            .map(|(opcode, _)| opcode)
            .collect();
        assert_eq!(undefined, vec![0xA5]);
    }

    #[test]
    fn test_page_jumps_in_every_row() {
        for row in 0..8u8 {
            assert_eq!(lookup(row << 5 | 0x01).op, Op::Ajmp);
            assert_eq!(lookup(row << 5 | 0x11).op, Op::Acall);
        }
    }

    #[test]
    fn test_regular_columns() {
        assert_eq!(lookup(0x24).op, Op::Add(Operand::Imm));
        assert_eq!(lookup(0x35).op, Op::Addc(Operand::Direct));
        assert_eq!(lookup(0x97).op, Op::Subb(Operand::Indirect(1)));
        assert_eq!(lookup(0x2B).op, Op::Add(Operand::Reg(3)));
        assert_eq!(lookup(0x04).op, Op::Inc(Operand::A));
        assert_eq!(lookup(0x15).op, Op::Dec(Operand::Direct));
        assert_eq!(lookup(0x43).op, Op::Orl(Operand::Direct, Operand::Imm));
        assert_eq!(lookup(0x52).op, Op::Anl(Operand::Direct, Operand::A));
        assert_eq!(lookup(0x6F).op, Op::Xrl(Operand::A, Operand::Reg(7)));
    }

    #[test]
    fn test_lengths_and_cycles() {
        assert_eq!((lookup(0x00).len, lookup(0x00).cycles), (1, 1));
        assert_eq!((lookup(0x02).len, lookup(0x02).cycles), (3, 2));
        assert_eq!((lookup(0x75).len, lookup(0x75).cycles), (3, 2));
        assert_eq!((lookup(0x85).len, lookup(0x85).cycles), (3, 2));
        assert_eq!((lookup(0x84).len, lookup(0x84).cycles), (1, 4));
        assert_eq!((lookup(0xA4).len, lookup(0xA4).cycles), (1, 4));
        assert_eq!((lookup(0xB6).len, lookup(0xB6).cycles), (3, 2));
        assert_eq!((lookup(0xD8).len, lookup(0xD8).cycles), (2, 2));
        assert_eq!((lookup(0x25).len, lookup(0x25).cycles), (2, 1));
        assert_eq!((lookup(0x43).len, lookup(0x43).cycles), (3, 2));
    }

    #[test]
    fn test_every_defined_opcode_has_sane_cost() {
        for (opcode, info) in OPCODES.iter().enumerate() {
            if info.op == Op::Undefined {
                continue;
            }
            assert!((1..=3).contains(&info.len), "{opcode:02X}");
            assert!(matches!(info.cycles, 1 | 2 | 4), "{opcode:02X}");
        }
    }
}
