//! 8051 Instruction-Set Interpreter
//!
//! A straight-line fetch/decode/execute loop over the full opcode space.
//! Decoding is a single index into [`opcodes::OPCODES`]; execution fetches the
//! operand bytes in encoding order as it resolves each operand.
//!
//! Direct addresses at or above 0x80 go through the [`SfrTable`]; the port and
//! serial handlers in that table forward to the [`PeripheralBridge`].

pub mod alu;
pub mod cycle_counter;
pub mod interrupt;
pub mod opcodes;

pub use alu::Psw;
pub use cycle_counter::CycleCounter;
pub use interrupt::{InterruptController, InterruptSource};
pub use opcodes::{Op, OpInfo, Operand, OPCODES};

use crate::bus::PeripheralBridge;
use crate::memory::sfr::{addr, SCON_RI};
use crate::memory::{BitLocation, Memory, SfrTable, SFR_BASE};
use crate::protocol::Frame;
use crate::{Ay8051Error, Result};
use log::{debug, error, trace};

/// Stack pointer after reset
pub const RESET_SP: u8 = 0x07;

/// Branch target of a relative jump: the signed displacement is added to the
/// address following the jump instruction, wrapping at 64 KB.
#[inline]
pub fn relative_target(next_pc: u16, rel: u8) -> u16 {
    next_pc.wrapping_add(rel as i8 as i16 as u16)
}

/// Resolved operand location
#[derive(Debug, Clone, Copy)]
enum Loc {
    Acc,
    /// Direct address (SFR-redirected)
    Direct(u8),
    /// Internal data cell reached without SFR redirection
    Iram(u8),
    Imm(u8),
}

/// Register snapshot for display and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    /// Program counter
    pub pc: u16,
    /// Stack pointer
    pub sp: u8,
    /// Accumulator
    pub a: u8,
    /// B register
    pub b: u8,
    /// Data pointer
    pub dptr: u16,
    /// Program status word, parity included
    pub psw: u8,
    /// Machine cycles executed
    pub cycles: u64,
    /// Instructions executed
    pub instructions: u64,
}

impl std::fmt::Display for CpuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PC={:04X} A={:02X} B={:02X} SP={:02X} DPTR={:04X} PSW={:02X} cycles={}",
            self.pc, self.a, self.b, self.sp, self.dptr, self.psw, self.cycles
        )
    }
}

/// The microcontroller
pub struct Cpu8051 {
    pub(crate) pc: u16,
    pub(crate) sp: u8,
    pub(crate) a: u8,
    pub(crate) b: u8,
    pub(crate) dptr: u16,
    /// PSW without the parity bit (derived from A on read)
    psw: u8,
    pub(crate) mem: Memory,
    pub(crate) sfr: SfrTable,
    pub(crate) bridge: PeripheralBridge,
    interrupts: InterruptController,
    counter: CycleCounter,
    instructions: u64,
    /// Address and opcode of the fatal decode fault, once hit
    fault: Option<(u16, u8)>,
}

impl Cpu8051 {
    /// Interpreter with no peripherals attached
    pub fn new() -> Self {
        Self::with_bridge(PeripheralBridge::detached())
    }

    /// Interpreter whose ports and serial line are wired to `bridge`
    pub fn with_bridge(bridge: PeripheralBridge) -> Self {
        let mut cpu = Cpu8051 {
            pc: 0,
            sp: RESET_SP,
            a: 0,
            b: 0,
            dptr: 0,
            psw: 0,
            mem: Memory::new(),
            sfr: SfrTable::standard(),
            bridge,
            interrupts: InterruptController::new(),
            counter: CycleCounter::new(),
            instructions: 0,
            fault: None,
        };
        cpu.reset();
        cpu
    }

    /// Hardware reset. Program space is kept.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.sp = RESET_SP;
        self.a = 0;
        self.b = 0;
        self.dptr = 0;
        self.psw = 0;
        self.mem.clear_data();
        for port in [addr::P0, addr::P1, addr::P2, addr::P3] {
            self.mem.set_sfr_latch(port, 0xFF);
        }
        self.interrupts.reset();
        self.counter.reset();
        self.instructions = 0;
        self.fault = None;
    }

    /// Copy a firmware image into program space at `offset`
    pub fn load_firmware(&mut self, image: &[u8], offset: u16) -> Result<()> {
        self.mem.load_code(image, offset)?;
        debug!("loaded {} byte firmware image at 0x{:04X}", image.len(), offset);
        Ok(())
    }

    /// Machine cycles executed since reset
    pub fn cycles(&self) -> u64 {
        self.counter.get_cycles()
    }

    /// Instructions executed since reset
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Program counter
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Whether a fatal decode fault stopped the interpreter
    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    /// Address and opcode of the fault that halted the interpreter
    pub fn fault(&self) -> Option<(u16, u8)> {
        self.fault
    }

    /// Register snapshot
    pub fn state(&self) -> CpuState {
        CpuState {
            pc: self.pc,
            sp: self.sp,
            a: self.a,
            b: self.b,
            dptr: self.dptr,
            psw: self.psw_value(),
            cycles: self.cycles(),
            instructions: self.instructions,
        }
    }

    /// Memory (read-only view)
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// Peripheral bridge
    pub fn bridge(&self) -> &PeripheralBridge {
        &self.bridge
    }

    /// Peripheral bridge (mutable)
    pub fn bridge_mut(&mut self) -> &mut PeripheralBridge {
        &mut self.bridge
    }

    /// SFR handler table, for installing extra peripherals
    pub fn sfr_table_mut(&mut self) -> &mut SfrTable {
        &mut self.sfr
    }

    /// Interrupt controller
    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    /// PSW as the firmware sees it (parity derived from A)
    pub fn psw_value(&self) -> u8 {
        let parity = if alu::parity(self.a) { Psw::P.bits() } else { 0 };
        self.psw | parity
    }

    /// Load PSW (the parity bit is read-only)
    pub fn set_psw_value(&mut self, value: u8) {
        self.psw = value & !Psw::P.bits();
    }

    /// Read a direct address (SFR-redirected at 0x80 and above)
    pub fn read_direct(&self, address: u8) -> u8 {
        if address >= SFR_BASE {
            if let Some(handler) = self.sfr.get(address) {
                return (handler.read)(self, address);
            }
        }
        self.mem.iram(address)
    }

    /// Write a direct address, running the SFR side effect if one is registered
    pub fn write_direct(&mut self, address: u8, value: u8) {
        if address >= SFR_BASE {
            if let Some(handler) = self.sfr.get(address) {
                (handler.write)(self, address, value);
                return;
            }
        }
        self.mem.set_iram(address, value);
    }

    /// A byte arrived on the UART: load SBUF, set RI and request the serial
    /// interrupt when ES is enabled. The byte is also passed to the bridge's
    /// framer; the completed frame, if any, is returned.
    pub fn uart_receive(&mut self, byte: u8) -> Option<Frame> {
        self.mem.set_sfr_latch(addr::SBUF, byte);
        let scon = self.mem.sfr_latch(addr::SCON);
        self.mem.set_sfr_latch(addr::SCON, scon | SCON_RI);
        if self.mem.sfr_latch(addr::IE) & InterruptSource::Serial.enable_mask() != 0 {
            self.interrupts.raise(InterruptSource::Serial);
        }
        self.bridge.serial_received(byte)
    }

    /// Execute one instruction, entering a pending interrupt first if one is
    /// armed. Returns the machine cycles consumed.
    ///
    /// An undefined opcode stops the interpreter: this and every later call
    /// return [`Ay8051Error::UndefinedOpcode`].
    pub fn step(&mut self) -> Result<u32> {
        if let Some((pc, opcode)) = self.fault {
            return Err(Ay8051Error::UndefinedOpcode { pc, opcode });
        }

        let mut spent = 0;
        let ie = self.mem.sfr_latch(addr::IE);
        if let Some(source) = self.interrupts.next(ie) {
            debug!("interrupt {:?} at PC={:04X}", source, self.pc);
            self.push_pc();
            self.pc = source.vector();
            spent += 2;
            self.counter.advance(2);
        }

        let start = self.pc;
        let opcode = self.fetch();
        let info = opcodes::lookup(opcode);
        trace!("{:04X}: {:02X} {}", start, opcode, info.mnemonic);

        if info.op == Op::Undefined {
            self.pc = start;
            self.fault = Some((start, opcode));
            error!("undefined opcode 0x{:02X} at PC=0x{:04X}", opcode, start);
            return Err(Ay8051Error::UndefinedOpcode { pc: start, opcode });
        }

        self.execute(opcode, info.op);
        self.counter.advance(info.cycles as u64);
        self.instructions += 1;
        Ok(spent + info.cycles as u32)
    }

    /// Execute until at least `budget` machine cycles have elapsed.
    /// Returns the cycles actually spent.
    pub fn run(&mut self, budget: u64) -> Result<u64> {
        let start = self.cycles();
        while self.counter.since(start) < budget {
            self.step()?;
        }
        Ok(self.counter.since(start))
    }

    // ---- fetch and operand helpers ----

    #[inline]
    fn fetch(&mut self) -> u8 {
        let byte = self.mem.code(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Internal data address of working register `n` in the selected bank
    #[inline]
    fn reg_addr(&self, n: u8) -> u8 {
        (self.psw & (Psw::RS1 | Psw::RS0).bits()) | (n & 0x07)
    }

    fn resolve(&mut self, operand: Operand) -> Loc {
        match operand {
            Operand::A => Loc::Acc,
            Operand::Direct => Loc::Direct(self.fetch()),
            Operand::Imm => Loc::Imm(self.fetch()),
            Operand::Reg(n) => Loc::Iram(self.reg_addr(n)),
            Operand::Indirect(i) => Loc::Iram(self.mem.iram(self.reg_addr(i))),
        }
    }

    fn load(&self, loc: Loc) -> u8 {
        match loc {
            Loc::Acc => self.a,
            Loc::Direct(address) => self.read_direct(address),
            Loc::Iram(address) => self.mem.iram(address),
            Loc::Imm(value) => value,
        }
    }

    fn store(&mut self, loc: Loc, value: u8) {
        match loc {
            Loc::Acc => self.a = value,
            Loc::Direct(address) => self.write_direct(address, value),
            Loc::Iram(address) => self.mem.set_iram(address, value),
            // Never a destination in the descriptor table
            Loc::Imm(_) => {}
        }
    }

    #[inline]
    fn carry(&self) -> bool {
        self.psw & Psw::CY.bits() != 0
    }

    #[inline]
    fn set_carry(&mut self, carry: bool) {
        if carry {
            self.psw |= Psw::CY.bits();
        } else {
            self.psw &= !Psw::CY.bits();
        }
    }

    fn read_bit(&self, bit_addr: u8) -> bool {
        let loc = BitLocation::resolve(bit_addr);
        self.read_direct(loc.byte) & loc.mask() != 0
    }

    fn write_bit(&mut self, bit_addr: u8, value: bool) {
        let loc = BitLocation::resolve(bit_addr);
        let byte = self.read_direct(loc.byte);
        let updated = if value { byte | loc.mask() } else { byte & !loc.mask() };
        self.write_direct(loc.byte, updated);
    }

    fn push(&mut self, value: u8) {
        self.sp = self.sp.wrapping_add(1);
        self.mem.set_iram(self.sp, value);
    }

    fn pop(&mut self) -> u8 {
        let value = self.mem.iram(self.sp);
        self.sp = self.sp.wrapping_sub(1);
        value
    }

    /// Push the return address, low byte first
    fn push_pc(&mut self) {
        self.push(self.pc as u8);
        self.push((self.pc >> 8) as u8);
    }

    fn pop_pc(&mut self) {
        let high = self.pop() as u16;
        let low = self.pop() as u16;
        self.pc = (high << 8) | low;
    }

    /// Read a displacement byte and branch when `condition` holds
    fn branch_if(&mut self, condition: bool) {
        let rel = self.fetch();
        if condition {
            self.pc = relative_target(self.pc, rel);
        }
    }

    fn execute(&mut self, opcode: u8, op: Op) {
        match op {
            Op::Nop | Op::Undefined => {}

            // ---- control transfer ----
            Op::Ajmp => {
                let low = self.fetch() as u16;
                self.pc = (self.pc & 0xF800) | ((opcode as u16 & 0xE0) << 3) | low;
            }
            Op::Acall => {
                let low = self.fetch() as u16;
                self.push_pc();
                self.pc = (self.pc & 0xF800) | ((opcode as u16 & 0xE0) << 3) | low;
            }
            Op::Ljmp => {
                let high = self.fetch() as u16;
                let low = self.fetch() as u16;
                self.pc = (high << 8) | low;
            }
            Op::Lcall => {
                let high = self.fetch() as u16;
                let low = self.fetch() as u16;
                self.push_pc();
                self.pc = (high << 8) | low;
            }
            Op::Sjmp => self.branch_if(true),
            Op::JmpIndirect => self.pc = self.dptr.wrapping_add(self.a as u16),
            Op::Ret => self.pop_pc(),
            Op::Reti => {
                self.pop_pc();
                self.interrupts.end_service();
            }
            Op::Jc => self.branch_if(self.carry()),
            Op::Jnc => self.branch_if(!self.carry()),
            Op::Jz => self.branch_if(self.a == 0),
            Op::Jnz => self.branch_if(self.a != 0),
            Op::Jb | Op::Jnb | Op::Jbc => {
                let bit = self.fetch();
                let set = self.read_bit(bit);
                let taken = match op {
                    Op::Jnb => !set,
                    _ => set,
                };
                if op == Op::Jbc && set {
                    self.write_bit(bit, false);
                }
                self.branch_if(taken);
            }
            Op::Cjne(lhs, rhs) => {
                let lhs = self.resolve(lhs);
                let rhs = self.resolve(rhs);
                let (left, right) = (self.load(lhs), self.load(rhs));
                self.set_carry(left < right);
                self.branch_if(left != right);
            }
            Op::Djnz(target) => {
                let loc = self.resolve(target);
                let value = self.load(loc).wrapping_sub(1);
                self.store(loc, value);
                self.branch_if(value != 0);
            }

            // ---- accumulator ----
            Op::Rr => self.a = self.a.rotate_right(1),
            Op::Rl => self.a = self.a.rotate_left(1),
            Op::Rrc => {
                let carry_out = self.a & 0x01 != 0;
                self.a = (self.a >> 1) | ((self.carry() as u8) << 7);
                self.set_carry(carry_out);
            }
            Op::Rlc => {
                let carry_out = self.a & 0x80 != 0;
                self.a = (self.a << 1) | self.carry() as u8;
                self.set_carry(carry_out);
            }
            Op::Swap => self.a = self.a.rotate_left(4),
            Op::ClrA => self.a = 0,
            Op::CplA => self.a = !self.a,
            Op::Da => {
                let (value, psw) = alu::decimal_adjust(self.a, self.psw);
                self.a = value;
                self.psw = psw;
            }

            // ---- arithmetic ----
            Op::Inc(target) => {
                let loc = self.resolve(target);
                let value = self.load(loc).wrapping_add(1);
                self.store(loc, value);
            }
            Op::Dec(target) => {
                let loc = self.resolve(target);
                let value = self.load(loc).wrapping_sub(1);
                self.store(loc, value);
            }
            Op::IncDptr => self.dptr = self.dptr.wrapping_add(1),
            Op::Add(src) | Op::Addc(src) => {
                let loc = self.resolve(src);
                let operand = self.load(loc);
                let carry_in = matches!(op, Op::Addc(_)) && self.carry();
                let (value, psw) = alu::add(self.a, operand, carry_in, self.psw);
                self.a = value;
                self.psw = psw;
            }
            Op::Subb(src) => {
                let loc = self.resolve(src);
                let operand = self.load(loc);
                let (value, psw) = alu::subb(self.a, operand, self.carry(), self.psw);
                self.a = value;
                self.psw = psw;
            }
            Op::Mul => {
                let (low, high, psw) = alu::multiply(self.a, self.b, self.psw);
                self.a = low;
                self.b = high;
                self.psw = psw;
            }
            Op::Div => {
                let (quotient, remainder, psw) = alu::divide(self.a, self.b, self.psw);
                self.a = quotient;
                self.b = remainder;
                self.psw = psw;
            }

            // ---- logic ----
            Op::Orl(dst, src) | Op::Anl(dst, src) | Op::Xrl(dst, src) => {
                let dst = self.resolve(dst);
                let src = self.resolve(src);
                let (left, right) = (self.load(dst), self.load(src));
                let value = match op {
                    Op::Orl(..) => left | right,
                    Op::Anl(..) => left & right,
                    _ => left ^ right,
                };
                self.store(dst, value);
            }
            Op::OrlC { complement } => {
                let bit = self.fetch();
                let value = self.read_bit(bit) != complement;
                self.set_carry(self.carry() | value);
            }
            Op::AnlC { complement } => {
                let bit = self.fetch();
                let value = self.read_bit(bit) != complement;
                self.set_carry(self.carry() & value);
            }

            // ---- bits ----
            Op::ClrC => self.set_carry(false),
            Op::SetbC => self.set_carry(true),
            Op::CplC => self.set_carry(!self.carry()),
            Op::ClrBit | Op::SetbBit | Op::CplBit => {
                let bit = self.fetch();
                let value = match op {
                    Op::ClrBit => false,
                    Op::SetbBit => true,
                    _ => !self.read_bit(bit),
                };
                self.write_bit(bit, value);
            }
            Op::MovCBit => {
                let bit = self.fetch();
                let value = self.read_bit(bit);
                self.set_carry(value);
            }
            Op::MovBitC => {
                let bit = self.fetch();
                self.write_bit(bit, self.carry());
            }

            // ---- data transfer ----
            Op::Mov(dst, src) => {
                let dst = self.resolve(dst);
                let src = self.resolve(src);
                let value = self.load(src);
                self.store(dst, value);
            }
            Op::MovDirectDirect => {
                let src = self.fetch();
                let dst = self.fetch();
                let value = self.read_direct(src);
                self.write_direct(dst, value);
            }
            Op::MovDptr => {
                let high = self.fetch() as u16;
                let low = self.fetch() as u16;
                self.dptr = (high << 8) | low;
            }
            Op::MovcDptr => self.a = self.mem.code(self.dptr.wrapping_add(self.a as u16)),
            Op::MovcPc => self.a = self.mem.code(self.pc.wrapping_add(self.a as u16)),
            Op::MovxReadDptr => self.a = self.mem.xram(self.dptr),
            Op::MovxWriteDptr => self.mem.set_xram(self.dptr, self.a),
            Op::MovxReadIndirect(i) => {
                let address = self.mem.iram(self.reg_addr(i));
                self.a = self.mem.xram(address as u16);
            }
            Op::MovxWriteIndirect(i) => {
                let address = self.mem.iram(self.reg_addr(i));
                self.mem.set_xram(address as u16, self.a);
            }
            Op::Push => {
                let address = self.fetch();
                let value = self.read_direct(address);
                self.push(value);
            }
            Op::Pop => {
                let address = self.fetch();
                let value = self.pop();
                self.write_direct(address, value);
            }
            Op::Xch(src) => {
                let loc = self.resolve(src);
                let value = self.load(loc);
                self.store(loc, self.a);
                self.a = value;
            }
            Op::Xchd(i) => {
                let address = self.mem.iram(self.reg_addr(i));
                let cell = self.mem.iram(address);
                self.mem
                    .set_iram(address, (cell & 0xF0) | (self.a & 0x0F));
                self.a = (self.a & 0xF0) | (cell & 0x0F);
            }
        }
    }
}

impl Default for Cpu8051 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu8051 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu8051")
            .field("state", &self.state())
            .field("interrupts", &self.interrupts)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}
