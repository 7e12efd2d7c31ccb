#![cfg_attr(debug_assertions, allow(dead_code))]

pub mod config;
pub mod cpu;
pub mod device;
pub mod isa;
pub mod ram;
mod utils;

pub use config::{CpuConfig, ShadowPolicy, ram_config};
pub use isa::riscv::{
    default_instruction_sets,
    error::{ConfigError, CpuError},
    executor::{CpuState, HaltReport, RV32CPU},
    instruction::{Instruction, InstructionSet},
    trap::{Exception, Interrupt, Trap},
};
