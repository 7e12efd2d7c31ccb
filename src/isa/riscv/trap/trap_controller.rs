use crate::{
    config::arch_config::WordType,
    isa::riscv::{
        csr_reg::{PrivilegeLevel, StatusFlags, csr_index},
        error::CpuError,
        executor::RV32CPU,
        trap::{Interrupt, Trap},
    },
};

/// CSRs a trap handler of one privilege level works with.
struct TrapCsrs {
    cause: WordType,
    epc: WordType,
    tval: WordType,
    tvec: WordType,
}

const M_MODE_CSRS: TrapCsrs = TrapCsrs {
    cause: csr_index::mcause,
    epc: csr_index::mepc,
    tval: csr_index::mtval,
    tvec: csr_index::mtvec,
};

const S_MODE_CSRS: TrapCsrs = TrapCsrs {
    cause: csr_index::scause,
    epc: csr_index::sepc,
    tval: csr_index::stval,
    tvec: csr_index::stvec,
};

pub(in crate::isa::riscv) struct TrapController {}

impl TrapController {
    fn is_delegated(cpu: &RV32CPU, trap: Trap) -> Result<bool, CpuError> {
        let (deleg, bit) = match trap {
            Trap::Interrupt(interrupt, _) => (csr_index::mideleg, interrupt.mask()),
            Trap::Exception(exception, _) => (csr_index::medeleg, 1 << u32::from(exception)),
        };
        Ok(cpu.read_raw_csr(deleg)? & bit != 0)
    }

    /// Take `trap` at the current `pc`.
    ///
    /// Traps taken from U/S go to S-mode when `medeleg`/`mideleg` says so, everything else goes
    /// to M-mode. Fails only when a CSR the handler needs was never registered.
    pub fn send_trap_signal(cpu: &mut RV32CPU, trap: Trap) -> Result<(), CpuError> {
        let cpl = cpu.privilege_level();
        let target = if cpl <= PrivilegeLevel::S && Self::is_delegated(cpu, trap)? {
            PrivilegeLevel::S
        } else {
            PrivilegeLevel::M
        };
        let regs = match target {
            PrivilegeLevel::S => &S_MODE_CSRS,
            _ => &M_MODE_CSRS,
        };

        // Everything is read before the first write, so a missing CSR leaves no partial state.
        let status = StatusFlags::from_bits_retain(cpu.read_raw_csr(csr_index::mstatus)?);
        let tvec = cpu.read_raw_csr(regs.tvec)?;
        for addr in [regs.cause, regs.epc, regs.tval] {
            cpu.read_raw_csr(addr)?;
        }

        let mut new_status = status;
        if target == PrivilegeLevel::M {
            new_status.set(StatusFlags::MPIE, status.contains(StatusFlags::MIE));
            new_status.remove(StatusFlags::MIE);
            new_status = new_status.with_mpp(cpl);
        } else {
            new_status.set(StatusFlags::SPIE, status.contains(StatusFlags::SIE));
            new_status.remove(StatusFlags::SIE);
            new_status.set(StatusFlags::SPP, cpl == PrivilegeLevel::S);
        }

        cpu.write_raw_csr(regs.cause, trap.cause())?;
        cpu.write_raw_csr(regs.epc, cpu.pc)?;
        cpu.write_raw_csr(regs.tval, trap.tval())?;
        cpu.write_raw_csr(csr_index::mstatus, new_status.bits())?;
        cpu.csr.set_current_privileged(target);

        let next_pc = Self::next_pc_by_tvec(trap, tvec);
        log::debug!(
            "{} at {:#010x} taken in {:?}-mode, handler {:#010x}",
            trap,
            cpu.pc,
            target,
            next_pc
        );
        cpu.pc = next_pc;
        Ok(())
    }

    /// Highest-priority interrupt that is pending, enabled and allowed to preempt the current
    /// mode. `None` as well when the interrupt CSRs are not loaded.
    pub fn pending_interrupt(cpu: &RV32CPU) -> Result<Option<Interrupt>, CpuError> {
        if !cpu.csr.contains(csr_index::mip) || !cpu.csr.contains(csr_index::mie) {
            return Ok(None);
        }

        let pending = cpu.read_raw_csr(csr_index::mip)? & cpu.read_raw_csr(csr_index::mie)?;
        if pending == 0 {
            return Ok(None);
        }

        let mideleg = cpu
            .csr
            .read_uncheck_privilege(csr_index::mideleg)
            .unwrap_or(0);
        let status = cpu.csr.status();
        let cpl = cpu.privilege_level();

        let taken = Interrupt::PRIORITY.into_iter().find(|irq| {
            if pending & irq.mask() == 0 {
                return false;
            }
            if mideleg & irq.mask() != 0 {
                // Delegated interrupts never preempt M-mode.
                match cpl {
                    PrivilegeLevel::U => true,
                    PrivilegeLevel::S => status.contains(StatusFlags::SIE),
                    PrivilegeLevel::M => false,
                }
            } else {
                cpl < PrivilegeLevel::M || status.contains(StatusFlags::MIE)
            }
        });
        Ok(taken)
    }

    pub fn mret(cpu: &mut RV32CPU) {
        let status = cpu.csr.status();
        let mpp = status.mpp().unwrap_or(PrivilegeLevel::U);

        let mut new_status = status.with_mpp(PrivilegeLevel::U);
        new_status.set(StatusFlags::MIE, status.contains(StatusFlags::MPIE));
        new_status.insert(StatusFlags::MPIE);
        if mpp != PrivilegeLevel::M {
            new_status.remove(StatusFlags::MPRV);
        }

        cpu.csr.write_directly(csr_index::mstatus, new_status.bits());
        cpu.csr.set_current_privileged(mpp);
        cpu.pc = cpu.csr.read_directly(csr_index::mepc);
    }

    pub fn sret(cpu: &mut RV32CPU) {
        let status = cpu.csr.status();
        let spp = status.spp();

        let mut new_status = status;
        new_status.set(StatusFlags::SIE, status.contains(StatusFlags::SPIE));
        new_status.insert(StatusFlags::SPIE);
        new_status.remove(StatusFlags::SPP);
        // SRET always lands below M-mode.
        new_status.remove(StatusFlags::MPRV);

        cpu.csr.write_directly(csr_index::mstatus, new_status.bits());
        cpu.csr.set_current_privileged(spp);
        cpu.pc = cpu.csr.read_directly(csr_index::sepc);
    }

    /// Get the next pc value according to the trap vector (like `mtvec` or `stvec`).
    #[must_use]
    fn next_pc_by_tvec(trap: Trap, tvec: WordType) -> WordType {
        let base = tvec & !0b11;
        match (tvec & 0b11, trap) {
            // Vector Mode
            (1, Trap::Interrupt(..)) => base.wrapping_add(trap.code() * 4),
            // Direct Mode
            _ => base,
        }
    }
}
