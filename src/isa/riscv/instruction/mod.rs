pub(super) mod exec_function;
pub mod privileged;
pub mod rv32i;
pub mod rv32m;
pub mod zicntr;
pub mod zicsr;

use crate::{
    config::arch_config::WordType,
    isa::{
        DecodeMask, create_decode_mask,
        riscv::{
            csr_reg::CsrDesc,
            decoder::DispatchKey,
            executor::RV32CPU,
            trap::{Exception, Trap},
        },
    },
};

/// Behavior of an instruction. It decodes its own operands from the raw word and is responsible
/// for moving `pc`.
pub type ExecFn = fn(&mut RV32CPU, u32) -> Result<(), Trap>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrFormat {
    R,
    I,
    S,
    B,
    U,
    J,
}

#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub name: &'static str,
    pub format: InstrFormat,
    pub opcode: u8,
    pub funct3: Option<u8>,
    pub funct7: Option<u8>,
    /// Exact-match encoding, checked before the funct tables.
    pub pattern: Option<DecodeMask>,
    pub exec: ExecFn,
}

impl Instruction {
    const fn keyed(
        name: &'static str,
        format: InstrFormat,
        opcode: u8,
        funct3: Option<u8>,
        funct7: Option<u8>,
        exec: ExecFn,
    ) -> Self {
        Self {
            name,
            format,
            opcode,
            funct3,
            funct7,
            pattern: None,
            exec,
        }
    }

    pub const fn r(name: &'static str, opcode: u8, funct3: u8, funct7: u8, exec: ExecFn) -> Self {
        Self::keyed(name, InstrFormat::R, opcode, Some(funct3), Some(funct7), exec)
    }

    pub const fn i(name: &'static str, opcode: u8, funct3: u8, exec: ExecFn) -> Self {
        Self::keyed(name, InstrFormat::I, opcode, Some(funct3), None, exec)
    }

    /// I-type whose upper seven bits are fixed, e.g. `SRAI`.
    pub const fn i_funct7(
        name: &'static str,
        opcode: u8,
        funct3: u8,
        funct7: u8,
        exec: ExecFn,
    ) -> Self {
        Self::keyed(name, InstrFormat::I, opcode, Some(funct3), Some(funct7), exec)
    }

    pub const fn s(name: &'static str, opcode: u8, funct3: u8, exec: ExecFn) -> Self {
        Self::keyed(name, InstrFormat::S, opcode, Some(funct3), None, exec)
    }

    pub const fn b(name: &'static str, opcode: u8, funct3: u8, exec: ExecFn) -> Self {
        Self::keyed(name, InstrFormat::B, opcode, Some(funct3), None, exec)
    }

    pub const fn u(name: &'static str, opcode: u8, exec: ExecFn) -> Self {
        Self::keyed(name, InstrFormat::U, opcode, None, None, exec)
    }

    pub const fn j(name: &'static str, opcode: u8, exec: ExecFn) -> Self {
        Self::keyed(name, InstrFormat::J, opcode, None, None, exec)
    }

    pub const fn masked(
        name: &'static str,
        format: InstrFormat,
        pattern: &'static str,
        exec: ExecFn,
    ) -> Self {
        let mask = create_decode_mask(pattern);
        Self {
            name,
            format,
            opcode: (mask.key & 0x7f) as u8,
            funct3: None,
            funct7: None,
            pattern: Some(mask),
            exec,
        }
    }

    pub fn key(&self) -> DispatchKey {
        DispatchKey {
            opcode: self.opcode,
            funct3: self.funct3,
            funct7: self.funct7,
            pattern: self.pattern,
        }
    }
}

/// A bundle of instructions and the CSRs they rely on, composed into a CPU at construction.
#[derive(Debug)]
pub struct InstructionSet {
    pub name: &'static str,
    /// `misa` extension letters implied by this set.
    pub extensions: &'static str,
    pub instructions: &'static [Instruction],
    pub csrs: &'static [CsrDesc],
}

/// Operand fields of a raw instruction word. Immediates come back sign-extended.
pub(crate) mod field {
    use crate::{
        config::arch_config::WordType,
        utils::{bit_range, sign_extend},
    };

    #[inline]
    pub fn rd(raw: u32) -> u8 {
        bit_range(raw, 11, 7) as u8
    }

    #[inline]
    pub fn rs1(raw: u32) -> u8 {
        bit_range(raw, 19, 15) as u8
    }

    #[inline]
    pub fn rs2(raw: u32) -> u8 {
        bit_range(raw, 24, 20) as u8
    }

    #[inline]
    pub fn csr(raw: u32) -> WordType {
        bit_range(raw, 31, 20)
    }

    #[inline]
    pub fn imm_i(raw: u32) -> WordType {
        sign_extend(bit_range(raw, 31, 20), 12)
    }

    #[inline]
    pub fn imm_s(raw: u32) -> WordType {
        sign_extend((bit_range(raw, 31, 25) << 5) | bit_range(raw, 11, 7), 12)
    }

    #[inline]
    pub fn imm_b(raw: u32) -> WordType {
        let imm = (bit_range(raw, 31, 31) << 12)
            | (bit_range(raw, 7, 7) << 11)
            | (bit_range(raw, 30, 25) << 5)
            | (bit_range(raw, 11, 8) << 1);
        sign_extend(imm, 13)
    }

    #[inline]
    pub fn imm_u(raw: u32) -> WordType {
        raw & 0xffff_f000
    }

    #[inline]
    pub fn imm_j(raw: u32) -> WordType {
        let imm = (bit_range(raw, 31, 31) << 20)
            | (bit_range(raw, 19, 12) << 12)
            | (bit_range(raw, 20, 20) << 11)
            | (bit_range(raw, 30, 21) << 1);
        sign_extend(imm, 21)
    }
}

/// A helper function for normal instruction execution.
///
/// It takes a closure `f` that performs the actual instruction logic.
/// If `f` executes successfully, it will increase PC by 4.
#[inline(always)]
pub(super) fn normal_exec<F>(cpu: &mut RV32CPU, f: F) -> Result<(), Trap>
where
    F: FnOnce(&mut RV32CPU) -> Result<(), Trap>,
{
    f(cpu)?;
    cpu.pc = cpu.pc.wrapping_add(4);
    Ok(())
}

/// Move `pc` to `target`, which must be 4-byte aligned.
pub(super) fn jump_to(cpu: &mut RV32CPU, target: WordType) -> Result<(), Trap> {
    if target & 0b11 != 0 {
        return Err(Exception::InstructionMisaligned.with_tval(target));
    }
    cpu.pc = target;
    Ok(())
}
