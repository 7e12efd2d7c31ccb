use crate::config::arch_config::WordType;

pub const PAGE_SIZE_XLEN: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SIZE_XLEN;

// ============================================
// =================== SV32 ===================
// ============================================
pub const SV32_LEVELS: usize = 2;
pub const PTE_SIZE: u64 = 4;
pub const VPN_WIDTH: u32 = 10;
pub const VPN_MASK: WordType = (1 << VPN_WIDTH) - 1;
pub const PPN_WIDTH: u32 = 22;
/// Sv32 physical addresses are 34 bits wide.
pub const PHYSICAL_ADDR_WIDTH: u32 = PPN_WIDTH + PAGE_SIZE_XLEN;

pub const SATP_MODE_SHIFT: u32 = 31;
pub const SATP_PPN_MASK: WordType = (1 << PPN_WIDTH) - 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VirtualMemoryMode {
    Bare,
    Sv32,
}

impl VirtualMemoryMode {
    pub fn from_satp(satp: WordType) -> Self {
        if satp >> SATP_MODE_SHIFT == 1 {
            VirtualMemoryMode::Sv32
        } else {
            VirtualMemoryMode::Bare
        }
    }
}
