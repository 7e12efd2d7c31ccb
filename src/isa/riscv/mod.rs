use crate::isa::riscv::instruction::{
    InstructionSet, privileged::PRIVILEGED, rv32i::RV32I, rv32m::RV32M, zicntr::ZICNTR,
    zicsr::ZICSR,
};

mod cpu_tester;
pub mod csr_reg;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod instruction;
pub mod mmu;
pub mod trap;

/// The sets a hart is built with unless the embedder picks its own.
pub fn default_instruction_sets() -> [&'static InstructionSet; 5] {
    [&RV32I, &RV32M, &ZICSR, &ZICNTR, &PRIVILEGED]
}
