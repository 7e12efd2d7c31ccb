use crate::{
    config::arch_config::WordType,
    isa::riscv::{
        csr_reg::{
            CsrDesc, PrivilegeLevel, StatusFlags,
            behavior::{
                Counter, CounterKind, DelegatedInterrupts, Mstatus, ReadOnly, Shadow, Tvec, Warl,
            },
            csr_index::*,
        },
        executor::RV32CPU,
        instruction::{InstrFormat, Instruction, InstructionSet, normal_exec},
        trap::{Exception, Trap, trap_controller::TrapController},
    },
};

const SSTATUS_MASK: WordType = StatusFlags::SIE
    .union(StatusFlags::SPIE)
    .union(StatusFlags::SPP)
    .union(StatusFlags::SUM)
    .union(StatusFlags::MXR)
    .bits();
/// SSIP, STIP, SEIP
const S_INTERRUPTS: WordType = 0x222;
/// S and M bits of the six standard interrupts.
const ALL_INTERRUPTS: WordType = 0xAAA;
/// Every implemented exception except ECALL from M-mode.
const DELEGABLE_EXCEPTIONS: WordType = 0xB3FF;

#[rustfmt::skip]
const PRIVILEGED_INSTRS: &[Instruction] = &[
    Instruction::masked("MRET", InstrFormat::R, "0011000 00010 00000 000 00000 1110011", exec_mret),
    Instruction::masked("SRET", InstrFormat::R, "0001000 00010 00000 000 00000 1110011", exec_sret),
    Instruction::masked("WFI", InstrFormat::R, "0001000 00101 00000 000 00000 1110011", exec_wfi),
    Instruction::masked("SFENCE.VMA", InstrFormat::R, "0001001 ????? ????? 000 00000 1110011", exec_sfence_vma),
];

#[rustfmt::skip]
const PRIVILEGED_CSRS: &[CsrDesc] = &[
    // Machine information
    CsrDesc::new(mvendorid, "mvendorid", 0, &ReadOnly),
    CsrDesc::new(marchid, "marchid", 0, &ReadOnly),
    CsrDesc::new(mimpid, "mimpid", 0, &ReadOnly),
    CsrDesc::new(mhartid, "mhartid", 0, &ReadOnly),

    // Machine trap setup
    CsrDesc::new(mstatus, "mstatus", 0, &Mstatus),
    // Written with the loaded extensions when the CPU is built.
    CsrDesc::new(misa, "misa", 0, &Warl { mask: 0 }),
    CsrDesc::new(medeleg, "medeleg", 0, &Warl { mask: DELEGABLE_EXCEPTIONS }),
    CsrDesc::new(mideleg, "mideleg", 0, &Warl { mask: S_INTERRUPTS }),
    CsrDesc::new(mie, "mie", 0, &Warl { mask: ALL_INTERRUPTS }),
    CsrDesc::new(mtvec, "mtvec", 0, &Tvec),
    CsrDesc::new(mcounteren, "mcounteren", 0, &Warl { mask: 0b101 }),

    // Machine trap handling
    CsrDesc::new(mscratch, "mscratch", 0, &Warl::ALL),
    CsrDesc::new(mepc, "mepc", 0, &Warl { mask: !0b11 }),
    CsrDesc::new(mcause, "mcause", 0, &Warl::ALL),
    CsrDesc::new(mtval, "mtval", 0, &Warl::ALL),
    // MSIP/MTIP/MEIP are driven by the platform, only the S bits are writable.
    CsrDesc::new(mip, "mip", 0, &Warl { mask: S_INTERRUPTS }),

    // Machine counters
    CsrDesc::new(mcycle, "mcycle", 0, &Counter { kind: CounterKind::Cycle, high: false }),
    CsrDesc::new(minstret, "minstret", 0, &Counter { kind: CounterKind::Instret, high: false }),
    CsrDesc::new(mcycleh, "mcycleh", 0, &Counter { kind: CounterKind::Cycle, high: true }),
    CsrDesc::new(minstreth, "minstreth", 0, &Counter { kind: CounterKind::Instret, high: true }),

    // Supervisor
    CsrDesc::new(sstatus, "sstatus", 0, &Shadow { target: mstatus, read_mask: SSTATUS_MASK, write_mask: SSTATUS_MASK }),
    CsrDesc::new(sie, "sie", 0, &DelegatedInterrupts { target: mie, read_mask: S_INTERRUPTS, write_mask: S_INTERRUPTS }),
    CsrDesc::new(stvec, "stvec", 0, &Tvec),
    CsrDesc::new(scounteren, "scounteren", 0, &Warl { mask: 0b101 }),
    CsrDesc::new(sscratch, "sscratch", 0, &Warl::ALL),
    CsrDesc::new(sepc, "sepc", 0, &Warl { mask: !0b11 }),
    CsrDesc::new(scause, "scause", 0, &Warl::ALL),
    CsrDesc::new(stval, "stval", 0, &Warl::ALL),
    // Only SSIP is software writable from S-mode.
    CsrDesc::new(sip, "sip", 0, &DelegatedInterrupts { target: mip, read_mask: S_INTERRUPTS, write_mask: 0b10 }),
    CsrDesc::new(satp, "satp", 0, &Warl::ALL).with_level(PrivilegeLevel::S),
];

/// Trap return, `WFI`, `SFENCE.VMA` and the machine/supervisor CSRs.
pub static PRIVILEGED: InstructionSet = InstructionSet {
    name: "Privileged",
    extensions: "SU",
    instructions: PRIVILEGED_INSTRS,
    csrs: PRIVILEGED_CSRS,
};

fn illegal(raw: u32) -> Result<(), Trap> {
    Err(Exception::IllegalInstruction.with_tval(raw))
}

fn exec_mret(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    if cpu.privilege_level() != PrivilegeLevel::M {
        return illegal(raw);
    }
    TrapController::mret(cpu);
    Ok(())
}

fn exec_sret(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    match cpu.privilege_level() {
        PrivilegeLevel::U => illegal(raw),
        PrivilegeLevel::S if cpu.csr.status().contains(StatusFlags::TSR) => illegal(raw),
        _ => {
            TrapController::sret(cpu);
            Ok(())
        }
    }
}

/// No event source wakes a waiting hart here, so `WFI` retires immediately.
fn exec_wfi(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    if cpu.privilege_level() < PrivilegeLevel::M && cpu.csr.status().contains(StatusFlags::TW) {
        return illegal(raw);
    }
    normal_exec(cpu, |_| Ok(()))
}

/// Translations are not cached, so there is nothing to flush.
fn exec_sfence_vma(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    match cpu.privilege_level() {
        PrivilegeLevel::U => illegal(raw),
        PrivilegeLevel::S if cpu.csr.status().contains(StatusFlags::TVM) => illegal(raw),
        _ => normal_exec(cpu, |_| Ok(())),
    }
}
