use bitflags::bitflags;

use crate::{
    config::arch_config::WordType,
    device::Bus,
    isa::riscv::mmu::{
        address::{PhysicalAddr, PhysicalPageNum, VirtualAddr},
        config::{PTE_SIZE, SV32_LEVELS, VPN_MASK},
    },
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PTEFlags: u8 {
        const V = 1 << 0; // valid
        const R = 1 << 1; // read
        const W = 1 << 2; // write
        const X = 1 << 3; // execute
        const U = 1 << 4; // U-Mode
        const G = 1 << 5; // global mapping
        const A = 1 << 6; // accessed
        const D = 1 << 7; // dirty
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct PageTableEntry {
    pub bits: WordType,
}

impl PageTableEntry {
    pub fn new(mem_value: WordType) -> Self {
        PageTableEntry { bits: mem_value }
    }

    pub fn ppn(&self) -> PhysicalPageNum {
        PhysicalPageNum((self.bits >> 10) as u64)
    }

    pub fn flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.bits as u8)
    }

    pub fn check_flag(&self, flag: PTEFlags) -> bool {
        self.flags().contains(flag)
    }

    /// Invalid, or the reserved W-without-R encoding.
    pub fn is_malformed(&self) -> bool {
        let flags = self.flags();
        !flags.contains(PTEFlags::V)
            || (flags.contains(PTEFlags::W) && !flags.contains(PTEFlags::R))
    }

    pub fn is_leaf(&self) -> bool {
        self.flags().intersects(PTEFlags::R | PTEFlags::X)
    }

    /// A superpage leaf must have its low PPN bits clear.
    pub fn is_misaligned_at(&self, level: usize) -> bool {
        level > 0 && (self.bits >> 10) & VPN_MASK != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkError {
    /// The table itself says no: invalid, reserved or missing leaf.
    PageFault,
    /// A page table entry could not be read from the bus.
    AccessFault,
}

/// Walk the Sv32 table rooted at `root` and return the leaf PTE with its level.
pub fn find_pte(
    bus: &mut dyn Bus,
    root: PhysicalPageNum,
    vaddr: VirtualAddr,
) -> Result<(PageTableEntry, usize), WalkError> {
    let mut table = root.addr();
    for level in (0..SV32_LEVELS).rev() {
        let pte_addr: PhysicalAddr = table.offset_by(vaddr.vpn(level) as u64 * PTE_SIZE);
        let raw = pte_addr
            .to_bus()
            .ok_or(WalkError::AccessFault)
            .and_then(|addr| bus.read32(addr).map_err(|_| WalkError::AccessFault))?;
        let pte = PageTableEntry::new(raw);

        if pte.is_malformed() {
            return Err(WalkError::PageFault);
        }
        if pte.is_leaf() {
            return Ok((pte, level));
        }
        table = pte.ppn().addr();
    }

    Err(WalkError::PageFault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::Ram;

    const ROOT: WordType = 0x8001_0000;
    const LEAF_TABLE: WordType = 0x8001_1000;

    fn pointer_to(table: WordType) -> WordType {
        ((table >> 12) << 10) | PTEFlags::V.bits() as WordType
    }

    fn leaf(pa: WordType, flags: PTEFlags) -> WordType {
        ((pa >> 12) << 10) | (flags | PTEFlags::V).bits() as WordType
    }

    #[test]
    fn test_two_level_walk() {
        let mut ram = Ram::new(0x8000_0000, 0x2_0000);
        ram.write32(ROOT, pointer_to(LEAF_TABLE)).unwrap();
        ram.write32(LEAF_TABLE + 4, leaf(0x8000_2000, PTEFlags::R | PTEFlags::A))
            .unwrap();

        let (pte, level) =
            find_pte(&mut ram, PhysicalPageNum(0x80010), VirtualAddr(0x1234)).unwrap();
        assert_eq!(level, 0);
        assert_eq!(pte.ppn().addr(), PhysicalAddr(0x8000_2000));
        assert!(pte.check_flag(PTEFlags::A));

        assert_eq!(
            find_pte(&mut ram, PhysicalPageNum(0x80010), VirtualAddr(0x2000)),
            Err(WalkError::PageFault)
        );
    }

    #[test]
    fn test_superpage_and_reserved() {
        let mut ram = Ram::new(0x8000_0000, 0x2_0000);
        // VPN[1] = 1 -> 4 MiB superpage at 0x8040_0000.
        ram.write32(ROOT + 4, leaf(0x8040_0000, PTEFlags::R | PTEFlags::X))
            .unwrap();
        // VPN[1] = 2 -> write-only leaf, reserved.
        ram.write32(ROOT + 8, leaf(0x8080_0000, PTEFlags::W)).unwrap();

        let (pte, level) =
            find_pte(&mut ram, PhysicalPageNum(0x80010), VirtualAddr(0x0040_0010)).unwrap();
        assert_eq!(level, 1);
        assert!(!pte.is_misaligned_at(level));

        assert_eq!(
            find_pte(&mut ram, PhysicalPageNum(0x80010), VirtualAddr(0x0080_0000)),
            Err(WalkError::PageFault)
        );
        assert!(PageTableEntry::new(leaf(0x8000_1000, PTEFlags::R)).is_misaligned_at(1));
    }

    #[test]
    fn test_table_outside_bus() {
        let mut ram = Ram::new(0x8000_0000, 0x1000);
        assert_eq!(
            find_pte(&mut ram, PhysicalPageNum(0x10), VirtualAddr(0)),
            Err(WalkError::AccessFault)
        );
    }
}
