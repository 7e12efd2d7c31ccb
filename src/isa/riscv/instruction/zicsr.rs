use crate::isa::riscv::instruction::{
    Instruction, InstructionSet, exec_function::*, rv32i::opcode::SYSTEM,
};

#[rustfmt::skip]
const ZICSR_INSTRS: &[Instruction] = &[
    Instruction::i("CSRRW", SYSTEM, 0b001, exec_csrrw::<false>),
    Instruction::i("CSRRS", SYSTEM, 0b010, exec_csr_bit::<true, false>),
    Instruction::i("CSRRC", SYSTEM, 0b011, exec_csr_bit::<false, false>),
    Instruction::i("CSRRWI", SYSTEM, 0b101, exec_csrrw::<true>),
    Instruction::i("CSRRSI", SYSTEM, 0b110, exec_csr_bit::<true, true>),
    Instruction::i("CSRRCI", SYSTEM, 0b111, exec_csr_bit::<false, true>),
];

/// CSR access instructions. The registers themselves come from the other sets.
pub static ZICSR: InstructionSet = InstructionSet {
    name: "Zicsr",
    extensions: "",
    instructions: ZICSR_INSTRS,
    csrs: &[],
};
