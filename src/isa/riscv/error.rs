use thiserror::Error;

use crate::{
    config::arch_config::WordType,
    isa::riscv::{decoder::DispatchKey, instruction::InstrFormat, trap::Trap},
};

/// Failures of the simulator itself. Anything guest-visible is a [`Trap`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// Internal code reached for a CSR that no loaded instruction set registered.
    #[error("CSR {0:#05x} is not registered")]
    UnknownCsr(WordType),

    #[error("failed to deliver {trap}: {source}")]
    TrapDelivery {
        trap: Trap,
        #[source]
        source: Box<CpuError>,
    },

    #[error("breakpoint at {pc:#010x}")]
    Breakpoint { pc: WordType },

    #[error("the cpu is halted")]
    Halted,
}

/// Errors raised while building the dispatch table and CSR bank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{name}` collides with `{existing}` at {key}")]
    DuplicateInstruction {
        name: &'static str,
        existing: &'static str,
        key: DispatchKey,
    },

    #[error("`{name}` ({format:?}) cannot share opcode {opcode:#04x} with `{existing}` ({existing_format:?})")]
    FormatConflict {
        name: &'static str,
        format: InstrFormat,
        opcode: u8,
        existing: &'static str,
        existing_format: InstrFormat,
    },

    #[error("`{name}` at {key} is ambiguous with `{existing}`, which is keyed differently")]
    AmbiguousEncoding {
        name: &'static str,
        existing: &'static str,
        key: DispatchKey,
    },

    #[error("`{name}`: {reason}")]
    InvalidEncoding {
        name: &'static str,
        reason: &'static str,
    },

    #[error("CSR {addr:#05x} `{name}` collides with `{existing}`")]
    DuplicateCsr {
        addr: WordType,
        name: &'static str,
        existing: &'static str,
    },
}
