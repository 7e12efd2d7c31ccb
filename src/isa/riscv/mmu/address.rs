use crate::{
    config::arch_config::WordType,
    isa::riscv::mmu::config::{PAGE_SIZE, PAGE_SIZE_XLEN, PHYSICAL_ADDR_WIDTH, VPN_MASK, VPN_WIDTH},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VirtualAddr(pub WordType);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysicalAddr(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhysicalPageNum(pub u64);

impl From<WordType> for VirtualAddr {
    fn from(value: WordType) -> Self {
        Self(value)
    }
}

impl VirtualAddr {
    /// `VPN[level]` of this address.
    pub fn vpn(&self, level: usize) -> WordType {
        (self.0 >> (PAGE_SIZE_XLEN + VPN_WIDTH * level as u32)) & VPN_MASK
    }

    /// Bits below the page of a leaf found at `level`.
    pub fn offset(&self, level: usize) -> u64 {
        let bits = PAGE_SIZE_XLEN + VPN_WIDTH * level as u32;
        (self.0 as u64) & ((1 << bits) - 1)
    }
}

impl PhysicalPageNum {
    pub fn addr(&self) -> PhysicalAddr {
        PhysicalAddr(self.0 * PAGE_SIZE)
    }
}

impl PhysicalAddr {
    pub fn offset_by(&self, offset: u64) -> PhysicalAddr {
        PhysicalAddr(self.0 + offset)
    }

    /// The bus is 32 bits wide; anything above is not reachable.
    pub fn to_bus(&self) -> Option<WordType> {
        debug_assert!(self.0 >> PHYSICAL_ADDR_WIDTH == 0);
        WordType::try_from(self.0).ok()
    }
}
