pub mod address;
pub mod config;
mod page_table;

pub use page_table::{PTEFlags, PageTableEntry};

use crate::{
    config::arch_config::WordType,
    device::Bus,
    isa::riscv::{
        csr_reg::{CsrRegFile, PrivilegeLevel, StatusFlags, csr_index},
        mmu::{
            address::{PhysicalPageNum, VirtualAddr},
            config::{SATP_PPN_MASK, VirtualMemoryMode},
            page_table::{WalkError, find_pte},
        },
        trap::Exception,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Load,
    Store,
    Fetch,
}

impl AccessType {
    pub fn page_fault(self) -> Exception {
        match self {
            AccessType::Load => Exception::LoadPageFault,
            AccessType::Store => Exception::StorePageFault,
            AccessType::Fetch => Exception::InstructionPageFault,
        }
    }

    pub fn access_fault(self) -> Exception {
        match self {
            AccessType::Load => Exception::LoadFault,
            AccessType::Store => Exception::StoreFault,
            AccessType::Fetch => Exception::InstructionFault,
        }
    }

    pub fn misaligned(self) -> Exception {
        match self {
            AccessType::Load => Exception::LoadMisaligned,
            AccessType::Store => Exception::StoreMisaligned,
            AccessType::Fetch => Exception::InstructionMisaligned,
        }
    }
}

/// Owns the bus and translates every checked access before it reaches it.
pub struct Mmu {
    bus: Box<dyn Bus>,
}

impl Mmu {
    pub fn new(bus: Box<dyn Bus>) -> Self {
        Self { bus }
    }

    pub fn bus(&mut self) -> &mut dyn Bus {
        self.bus.as_mut()
    }

    /// Privilege used for the permission check. Loads and stores honour `mstatus.MPRV`.
    fn effective_privilege(csr: &CsrRegFile, access: AccessType) -> PrivilegeLevel {
        let status = csr.status();
        if access != AccessType::Fetch && status.contains(StatusFlags::MPRV) {
            status.mpp().unwrap_or(PrivilegeLevel::U)
        } else {
            csr.privilege_level()
        }
    }

    /// Translate `vaddr` into a bus address. The returned exception carries no trap value; the
    /// caller knows the faulting address.
    pub fn translate(
        &mut self,
        csr: &CsrRegFile,
        vaddr: WordType,
        access: AccessType,
    ) -> Result<WordType, Exception> {
        let level = Self::effective_privilege(csr, access);
        let satp = csr.read_directly(csr_index::satp);

        if level == PrivilegeLevel::M
            || VirtualMemoryMode::from_satp(satp) == VirtualMemoryMode::Bare
        {
            return Ok(vaddr);
        }

        let vaddr = VirtualAddr(vaddr);
        let root = PhysicalPageNum((satp & SATP_PPN_MASK) as u64);
        let (pte, pte_level) =
            find_pte(self.bus.as_mut(), root, vaddr).map_err(|err| match err {
                WalkError::PageFault => access.page_fault(),
                WalkError::AccessFault => access.access_fault(),
            })?;

        let status = csr.status();
        let permitted = match access {
            AccessType::Fetch => pte.check_flag(PTEFlags::X),
            AccessType::Load => {
                pte.check_flag(PTEFlags::R)
                    || (status.contains(StatusFlags::MXR) && pte.check_flag(PTEFlags::X))
            }
            AccessType::Store => pte.check_flag(PTEFlags::W),
        };
        if !permitted {
            return Err(access.page_fault());
        }

        let user_page = pte.check_flag(PTEFlags::U);
        let mode_ok = match level {
            PrivilegeLevel::U => user_page,
            PrivilegeLevel::S => {
                !user_page || (access != AccessType::Fetch && status.contains(StatusFlags::SUM))
            }
            PrivilegeLevel::M => true,
        };
        if !mode_ok || pte.is_misaligned_at(pte_level) {
            return Err(access.page_fault());
        }

        // A and D are never updated by hardware here; software must set them.
        let dirty_ok = access != AccessType::Store || pte.check_flag(PTEFlags::D);
        if !pte.check_flag(PTEFlags::A) || !dirty_ok {
            return Err(access.page_fault());
        }

        // Misaligned superpages were rejected above, so the low PPN bits are zero.
        let paddr = pte.ppn().addr().offset_by(vaddr.offset(pte_level));

        log::trace!(
            "translate {:?} {:#010x} -> {:#x} (level {})",
            access,
            vaddr.0,
            paddr.0,
            pte_level
        );
        paddr.to_bus().ok_or(access.access_fault())
    }
}
