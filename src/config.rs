pub mod ram_config {
    use crate::config::arch_config::WordType;
    pub const BASE_ADDR: WordType = 0x8000_0000;
    pub const DEFAULT_PC_VALUE: WordType = BASE_ADDR;

    pub const SIZE: usize = 0x800_0000;
}

pub mod arch_config {
    pub type WordType = u32;
    pub type SignedWordType = i32;

    pub const XLEN: u32 = WordType::BITS;

    #[rustfmt::skip]
    pub const REG_NAME: [&str; 32] = [
        "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
        "s0/fp", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
        "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
        "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
    ];

    pub const REGFILE_CNT: usize = REG_NAME.len();
}

use crate::{config::arch_config::WordType, isa::riscv::csr_reg::PrivilegeLevel};

/// What happens when two loaded instruction sets claim the same dispatch key or CSR address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowPolicy {
    /// Construction fails with a [`ConfigError`](crate::isa::riscv::error::ConfigError).
    #[default]
    Reject,
    /// The later set wins. A warning is logged for every replaced entry.
    Replace,
}

#[derive(Debug, Clone)]
pub struct CpuConfig {
    pub reset_vector: WordType,
    pub shadow_policy: ShadowPolicy,
    /// Split misaligned loads/stores into byte accesses instead of raising a misaligned exception.
    pub misaligned_access: bool,
    /// Stop the run loop on `EBREAK` instead of trapping into the guest handler.
    pub halt_on_breakpoint: bool,
    pub dump_registers_on_halt: bool,
    pub initial_privilege: PrivilegeLevel,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            reset_vector: ram_config::BASE_ADDR,
            shadow_policy: ShadowPolicy::Reject,
            misaligned_access: false,
            halt_on_breakpoint: false,
            dump_registers_on_halt: false,
            initial_privilege: PrivilegeLevel::M,
        }
    }
}

impl CpuConfig {
    pub fn with_reset_vector(mut self, pc: WordType) -> Self {
        self.reset_vector = pc;
        self
    }

    pub fn with_shadow_policy(mut self, policy: ShadowPolicy) -> Self {
        self.shadow_policy = policy;
        self
    }

    pub fn with_misaligned_access(mut self, enable: bool) -> Self {
        self.misaligned_access = enable;
        self
    }

    pub fn with_halt_on_breakpoint(mut self, enable: bool) -> Self {
        self.halt_on_breakpoint = enable;
        self
    }

    pub fn with_dump_registers_on_halt(mut self, enable: bool) -> Self {
        self.dump_registers_on_halt = enable;
        self
    }

    pub fn with_initial_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.initial_privilege = level;
        self
    }
}
