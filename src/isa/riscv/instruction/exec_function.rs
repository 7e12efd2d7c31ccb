use crate::{
    config::arch_config::{SignedWordType, WordType},
    isa::riscv::{
        executor::RV32CPU,
        instruction::{field, jump_to, normal_exec},
        trap::Trap,
    },
    utils::sign_extend,
};

/// ExecTrait will generate operation result to `exec_xxx` function.
/// ExecTrait::exec only do calculate.
/// `exec_xxx` function interact with other mod in CPU.
pub(super) trait ExecTrait<T> {
    fn exec(a: WordType, b: WordType) -> T;
}

/// `rd = F(rs1, rs2)`
pub(super) fn exec_arith_r<F>(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap>
where
    F: ExecTrait<WordType>,
{
    normal_exec(cpu, |cpu| {
        let (val1, val2) = cpu.reg_file.read(field::rs1(raw), field::rs2(raw));
        cpu.reg_file.write(field::rd(raw), F::exec(val1, val2));
        Ok(())
    })
}

/// `rd = F(rs1, imm)`, with `imm` sign-extended from 12 bits.
pub(super) fn exec_arith_i<F>(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap>
where
    F: ExecTrait<WordType>,
{
    normal_exec(cpu, |cpu| {
        let val1 = cpu.reg_file.read(field::rs1(raw), 0).0;
        cpu.reg_file.write(field::rd(raw), F::exec(val1, field::imm_i(raw)));
        Ok(())
    })
}

pub(super) fn exec_branch<F>(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap>
where
    F: ExecTrait<bool>,
{
    let (val1, val2) = cpu.reg_file.read(field::rs1(raw), field::rs2(raw));

    if F::exec(val1, val2) {
        let target = cpu.pc.wrapping_add(field::imm_b(raw));
        jump_to(cpu, target)
    } else {
        cpu.pc = cpu.pc.wrapping_add(4);
        Ok(())
    }
}

pub(super) fn exec_load<const SIZE: u8, const EXTEND: bool>(
    cpu: &mut RV32CPU,
    raw: u32,
) -> Result<(), Trap> {
    normal_exec(cpu, |cpu| {
        let base = cpu.reg_file.read(field::rs1(raw), 0).0;
        let addr = base.wrapping_add(field::imm_i(raw));

        let mut data = match SIZE {
            1 => cpu.read_mem8(addr)? as WordType,
            2 => cpu.read_mem16(addr)? as WordType,
            _ => cpu.read_mem32(addr)?,
        };
        if EXTEND {
            data = sign_extend(data, SIZE as u32 * 8);
        }
        cpu.reg_file.write(field::rd(raw), data);
        Ok(())
    })
}

pub(super) fn exec_store<const SIZE: u8>(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    normal_exec(cpu, |cpu| {
        let (base, data) = cpu.reg_file.read(field::rs1(raw), field::rs2(raw));
        let addr = base.wrapping_add(field::imm_s(raw));

        match SIZE {
            1 => cpu.write_mem8(addr, data as u8),
            2 => cpu.write_mem16(addr, data as u16),
            _ => cpu.write_mem32(addr, data),
        }
    })
}

/// `CSRRW`/`CSRRWI`. With `rd == x0` the CSR is not read at all.
pub(super) fn exec_csrrw<const UIMM: bool>(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    let (rd, rs1, addr) = (field::rd(raw), field::rs1(raw), field::csr(raw));

    normal_exec(cpu, |cpu| {
        let new_val = if UIMM {
            rs1 as WordType
        } else {
            cpu.reg_file.read(rs1, 0).0
        };

        let old_val = if rd != 0 {
            Some(cpu.read_csr(addr).map_err(|e| e.with_tval(raw))?)
        } else {
            None
        };

        cpu.write_csr(addr, new_val).map_err(|e| e.with_tval(raw))?;

        if let Some(value) = old_val {
            cpu.reg_file.write(rd, value);
        }
        Ok(())
    })
}

/// `CSRRS`/`CSRRC` and their immediate forms. With `rs1 == x0` (or `uimm == 0`) the CSR is
/// not written, so read-only CSRs can be read this way.
pub(super) fn exec_csr_bit<const SET: bool, const UIMM: bool>(
    cpu: &mut RV32CPU,
    raw: u32,
) -> Result<(), Trap> {
    let (rd, rs1, addr) = (field::rd(raw), field::rs1(raw), field::csr(raw));

    normal_exec(cpu, |cpu| {
        let rhs = if UIMM {
            rs1 as WordType
        } else {
            cpu.reg_file.read(rs1, 0).0
        };

        let value = cpu.read_csr(addr).map_err(|e| e.with_tval(raw))?;

        if rs1 != 0 {
            let data = if SET { value | rhs } else { value & !rhs };
            cpu.write_csr(addr, data).map_err(|e| e.with_tval(raw))?;
        }

        cpu.reg_file.write(rd, value);
        Ok(())
    })
}

pub(super) fn exec_nop(cpu: &mut RV32CPU, _raw: u32) -> Result<(), Trap> {
    normal_exec(cpu, |_| Ok(()))
}

// =============================================
//                  ExecTrait
// =============================================
// Arith
pub(super) struct ExecAdd {}
impl ExecTrait<WordType> for ExecAdd {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_add(b)
    }
}

pub(super) struct ExecSub {}
impl ExecTrait<WordType> for ExecSub {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_sub(b)
    }
}

pub(super) struct ExecMulLow {}
impl ExecTrait<WordType> for ExecMulLow {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_mul(b)
    }
}

pub(super) struct ExecMulHighUnsigned {}
impl ExecTrait<WordType> for ExecMulHighUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        ((a as u64).wrapping_mul(b as u64) >> 32) as WordType
    }
}

pub(super) struct ExecMulHighSigned {}
impl ExecTrait<WordType> for ExecMulHighSigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        let a = a as SignedWordType as i64;
        let b = b as SignedWordType as i64;

        (a.wrapping_mul(b) >> 32) as WordType
    }
}

pub(super) struct ExecMulHighSignedUnsigned {}
impl ExecTrait<WordType> for ExecMulHighSignedUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        let high = ExecMulHighUnsigned::exec(a, b);

        if (a as SignedWordType) < 0 {
            // Let M = 1 << XLEN, given a *negative* integer `a` bewteen [-M/2, 0).
            // Then a * b = (a + M) * b - M * b.
            // Here, a + M equals to the unsigned reinterpretation of `a`.
            high.wrapping_sub(b)
        } else {
            high
        }
    }
}

pub(super) struct ExecDivSigned {}
impl ExecTrait<WordType> for ExecDivSigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return WordType::MAX;
        }
        // MIN / -1 wraps back to MIN.
        (a as SignedWordType).wrapping_div(b as SignedWordType) as WordType
    }
}

pub(super) struct ExecDivUnsigned {}
impl ExecTrait<WordType> for ExecDivUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return WordType::MAX;
        }
        a / b
    }
}

pub(super) struct ExecRemSigned {}
impl ExecTrait<WordType> for ExecRemSigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return a;
        }
        (a as SignedWordType).wrapping_rem(b as SignedWordType) as WordType
    }
}

pub(super) struct ExecRemUnsigned {}
impl ExecTrait<WordType> for ExecRemUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return a;
        }
        a % b
    }
}

// Shift
pub(super) struct ExecSLL {}
impl ExecTrait<WordType> for ExecSLL {
    fn exec(a: WordType, b: WordType) -> WordType {
        a << (b & 0x1f)
    }
}

pub(super) struct ExecSRL {}
impl ExecTrait<WordType> for ExecSRL {
    fn exec(a: WordType, b: WordType) -> WordType {
        a >> (b & 0x1f)
    }
}

pub(super) struct ExecSRA {}
impl ExecTrait<WordType> for ExecSRA {
    fn exec(a: WordType, b: WordType) -> WordType {
        ((a as SignedWordType) >> (b & 0x1f)) as WordType
    }
}

// Bit
pub(super) struct ExecAnd {}
impl ExecTrait<WordType> for ExecAnd {
    fn exec(a: WordType, b: WordType) -> WordType {
        a & b
    }
}

pub(super) struct ExecOr {}
impl ExecTrait<WordType> for ExecOr {
    fn exec(a: WordType, b: WordType) -> WordType {
        a | b
    }
}

pub(super) struct ExecXor {}
impl ExecTrait<WordType> for ExecXor {
    fn exec(a: WordType, b: WordType) -> WordType {
        a ^ b
    }
}

// Compare, used by both `SLT*` and branches.
pub(super) struct ExecSignedLess {}
impl ExecTrait<bool> for ExecSignedLess {
    fn exec(a: WordType, b: WordType) -> bool {
        (a as SignedWordType) < (b as SignedWordType)
    }
}
impl ExecTrait<WordType> for ExecSignedLess {
    fn exec(a: WordType, b: WordType) -> WordType {
        <Self as ExecTrait<bool>>::exec(a, b) as WordType
    }
}

pub(super) struct ExecUnsignedLess {}
impl ExecTrait<bool> for ExecUnsignedLess {
    fn exec(a: WordType, b: WordType) -> bool {
        a < b
    }
}
impl ExecTrait<WordType> for ExecUnsignedLess {
    fn exec(a: WordType, b: WordType) -> WordType {
        <Self as ExecTrait<bool>>::exec(a, b) as WordType
    }
}

pub(super) struct ExecSignedGreatEqual {}
impl ExecTrait<bool> for ExecSignedGreatEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        (a as SignedWordType) >= (b as SignedWordType)
    }
}

pub(super) struct ExecUnsignedGreatEqual {}
impl ExecTrait<bool> for ExecUnsignedGreatEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a >= b
    }
}

pub(super) struct ExecEqual {}
impl ExecTrait<bool> for ExecEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a == b
    }
}

pub(super) struct ExecNotEqual {}
impl ExecTrait<bool> for ExecNotEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a != b
    }
}
