use crate::isa::riscv::instruction::{
    Instruction, InstructionSet, exec_function::*, rv32i::opcode::OP,
};

const MULDIV: u8 = 0b0000001;

#[rustfmt::skip]
const RV32M_INSTRS: &[Instruction] = &[
    Instruction::r("MUL", OP, 0b000, MULDIV, exec_arith_r::<ExecMulLow>),
    Instruction::r("MULH", OP, 0b001, MULDIV, exec_arith_r::<ExecMulHighSigned>),
    Instruction::r("MULHSU", OP, 0b010, MULDIV, exec_arith_r::<ExecMulHighSignedUnsigned>),
    Instruction::r("MULHU", OP, 0b011, MULDIV, exec_arith_r::<ExecMulHighUnsigned>),
    Instruction::r("DIV", OP, 0b100, MULDIV, exec_arith_r::<ExecDivSigned>),
    Instruction::r("DIVU", OP, 0b101, MULDIV, exec_arith_r::<ExecDivUnsigned>),
    Instruction::r("REM", OP, 0b110, MULDIV, exec_arith_r::<ExecRemSigned>),
    Instruction::r("REMU", OP, 0b111, MULDIV, exec_arith_r::<ExecRemUnsigned>),
];

pub static RV32M: InstructionSet = InstructionSet {
    name: "RV32M",
    extensions: "M",
    instructions: RV32M_INSTRS,
    csrs: &[],
};
