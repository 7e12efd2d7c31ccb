use crate::isa::riscv::{
    csr_reg::PrivilegeLevel,
    executor::RV32CPU,
    instruction::{
        InstrFormat, Instruction, InstructionSet, exec_function::*, field, jump_to, normal_exec,
    },
    trap::{Exception, Trap},
};

pub mod opcode {
    pub const LUI: u8 = 0b0110111;
    pub const AUIPC: u8 = 0b0010111;
    pub const JAL: u8 = 0b1101111;
    pub const JALR: u8 = 0b1100111;
    pub const BRANCH: u8 = 0b1100011;
    pub const LOAD: u8 = 0b0000011;
    pub const STORE: u8 = 0b0100011;
    pub const OP_IMM: u8 = 0b0010011;
    pub const OP: u8 = 0b0110011;
    pub const MISC_MEM: u8 = 0b0001111;
    pub const SYSTEM: u8 = 0b1110011;
}

use opcode::*;

const ALT: u8 = 0b0100000;

#[rustfmt::skip]
const RV32I_INSTRS: &[Instruction] = &[
    // Upper immediate
    Instruction::u("LUI", LUI, exec_lui),
    Instruction::u("AUIPC", AUIPC, exec_auipc),

    // Jump
    Instruction::j("JAL", JAL, exec_jal),
    Instruction::i("JALR", JALR, 0b000, exec_jalr),

    // Branch
    Instruction::b("BEQ", BRANCH, 0b000, exec_branch::<ExecEqual>),
    Instruction::b("BNE", BRANCH, 0b001, exec_branch::<ExecNotEqual>),
    Instruction::b("BLT", BRANCH, 0b100, exec_branch::<ExecSignedLess>),
    Instruction::b("BGE", BRANCH, 0b101, exec_branch::<ExecSignedGreatEqual>),
    Instruction::b("BLTU", BRANCH, 0b110, exec_branch::<ExecUnsignedLess>),
    Instruction::b("BGEU", BRANCH, 0b111, exec_branch::<ExecUnsignedGreatEqual>),

    // Mem
    Instruction::i("LB", LOAD, 0b000, exec_load::<1, true>),
    Instruction::i("LH", LOAD, 0b001, exec_load::<2, true>),
    Instruction::i("LW", LOAD, 0b010, exec_load::<4, false>),
    Instruction::i("LBU", LOAD, 0b100, exec_load::<1, false>),
    Instruction::i("LHU", LOAD, 0b101, exec_load::<2, false>),
    Instruction::s("SB", STORE, 0b000, exec_store::<1>),
    Instruction::s("SH", STORE, 0b001, exec_store::<2>),
    Instruction::s("SW", STORE, 0b010, exec_store::<4>),

    // Arith with immediate
    Instruction::i("ADDI", OP_IMM, 0b000, exec_arith_i::<ExecAdd>),
    Instruction::i("SLTI", OP_IMM, 0b010, exec_arith_i::<ExecSignedLess>),
    Instruction::i("SLTIU", OP_IMM, 0b011, exec_arith_i::<ExecUnsignedLess>),
    Instruction::i("XORI", OP_IMM, 0b100, exec_arith_i::<ExecXor>),
    Instruction::i("ORI", OP_IMM, 0b110, exec_arith_i::<ExecOr>),
    Instruction::i("ANDI", OP_IMM, 0b111, exec_arith_i::<ExecAnd>),
    Instruction::i_funct7("SLLI", OP_IMM, 0b001, 0, exec_arith_i::<ExecSLL>),
    Instruction::i_funct7("SRLI", OP_IMM, 0b101, 0, exec_arith_i::<ExecSRL>),
    Instruction::i_funct7("SRAI", OP_IMM, 0b101, ALT, exec_arith_i::<ExecSRA>),

    // Arith
    Instruction::r("ADD", OP, 0b000, 0, exec_arith_r::<ExecAdd>),
    Instruction::r("SUB", OP, 0b000, ALT, exec_arith_r::<ExecSub>),
    Instruction::r("SLL", OP, 0b001, 0, exec_arith_r::<ExecSLL>),
    Instruction::r("SLT", OP, 0b010, 0, exec_arith_r::<ExecSignedLess>),
    Instruction::r("SLTU", OP, 0b011, 0, exec_arith_r::<ExecUnsignedLess>),
    Instruction::r("XOR", OP, 0b100, 0, exec_arith_r::<ExecXor>),
    Instruction::r("SRL", OP, 0b101, 0, exec_arith_r::<ExecSRL>),
    Instruction::r("SRA", OP, 0b101, ALT, exec_arith_r::<ExecSRA>),
    Instruction::r("OR", OP, 0b110, 0, exec_arith_r::<ExecOr>),
    Instruction::r("AND", OP, 0b111, 0, exec_arith_r::<ExecAnd>),

    // Single hart, in-order memory: fences have nothing to order.
    Instruction::i("FENCE", MISC_MEM, 0b000, exec_nop),

    // Env
    Instruction::masked("ECALL", InstrFormat::I, "0000000 00000 00000 000 00000 1110011", exec_ecall),
    Instruction::masked("EBREAK", InstrFormat::I, "0000000 00001 00000 000 00000 1110011", exec_ebreak),
];

pub static RV32I: InstructionSet = InstructionSet {
    name: "RV32I",
    extensions: "I",
    instructions: RV32I_INSTRS,
    csrs: &[],
};

fn exec_lui(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    normal_exec(cpu, |cpu| {
        cpu.reg_file.write(field::rd(raw), field::imm_u(raw));
        Ok(())
    })
}

fn exec_auipc(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    normal_exec(cpu, |cpu| {
        cpu.reg_file
            .write(field::rd(raw), cpu.pc.wrapping_add(field::imm_u(raw)));
        Ok(())
    })
}

fn exec_jal(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    let link = cpu.pc.wrapping_add(4);
    let target = cpu.pc.wrapping_add(field::imm_j(raw));
    jump_to(cpu, target)?;
    cpu.reg_file.write(field::rd(raw), link);
    Ok(())
}

fn exec_jalr(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    let link = cpu.pc.wrapping_add(4);
    let base = cpu.reg_file.read(field::rs1(raw), 0).0;
    // rd may equal rs1, so the target is computed before the link is written.
    jump_to(cpu, base.wrapping_add(field::imm_i(raw)) & !1)?;
    cpu.reg_file.write(field::rd(raw), link);
    Ok(())
}

fn exec_ecall(cpu: &mut RV32CPU, _raw: u32) -> Result<(), Trap> {
    let exception = match cpu.privilege_level() {
        PrivilegeLevel::U => Exception::UserEnvCall,
        PrivilegeLevel::S => Exception::SupervisorEnvCall,
        PrivilegeLevel::M => Exception::MachineEnvCall,
    };
    Err(exception.into())
}

fn exec_ebreak(cpu: &mut RV32CPU, _raw: u32) -> Result<(), Trap> {
    Err(Exception::Breakpoint.with_tval(cpu.pc))
}
