use std::{cell::RefCell, rc::Rc};

use rv32_emulator::{
    ConfigError, CpuConfig, CpuError, CpuState, Exception, Instruction, InstructionSet, Interrupt,
    RV32CPU, ShadowPolicy, Trap,
    config::arch_config::WordType,
    device::{Bus, BusError},
    isa::riscv::{
        csr_reg::{PrivilegeLevel, StatusFlags, csr_index},
        instruction::{privileged::PRIVILEGED, rv32i::RV32I, zicsr::ZICSR},
    },
    ram::Ram,
    ram_config::BASE_ADDR,
};

const RAM_SIZE: usize = 0x20_0000;
const HANDLER: WordType = BASE_ADDR + 0x100;

const NOP: u32 = 0x00000013;
const EBREAK: u32 = 0x00100073;
const MRET: u32 = 0x30200073;

fn cpu_with(program: &[u32], config: CpuConfig) -> RV32CPU {
    let mut ram = Ram::new(BASE_ADDR, RAM_SIZE);
    let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    ram.insert_section(&bytes, BASE_ADDR).unwrap();
    RV32CPU::with_default_sets(Box::new(ram), config).unwrap()
}

fn cpu(program: &[u32]) -> RV32CPU {
    cpu_with(program, CpuConfig::default())
}

fn step_n(cpu: &mut RV32CPU, n: usize) {
    for _ in 0..n {
        cpu.step().unwrap();
    }
}

#[test]
fn test_addi_pair() {
    // addi x1, x0, 5; addi x2, x1, 7
    let mut cpu = cpu(&[0x00500093, 0x00708113]);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.read_reg(1), 5);
    assert_eq!(cpu.read_reg(2), 12);
    assert_eq!(cpu.pc(), BASE_ADDR + 8);
    assert_eq!(cpu.last_trap(), None);
}

#[test]
fn test_addi_negative_immediate() {
    // addi x5, x0, 5; addi x6, x5, -3
    let mut cpu = cpu(&[0x00500293, 0xFFD28313]);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.read_reg(5), 5);
    assert_eq!(cpu.read_reg(6), 2);
    assert_eq!(cpu.pc(), BASE_ADDR + 8);
    assert_eq!(cpu.last_trap(), None);
}

#[test]
fn test_jal_backwards() {
    // nop; jal x0, -4
    let mut cpu = cpu(&[NOP, 0xFFDFF06F]);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.pc(), BASE_ADDR);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.pc(), BASE_ADDR);
}

#[test]
fn test_beq() {
    // beq x1, x2, 8
    let mut cpu = cpu(&[0x00208463]);
    cpu.write_reg(1, 3);
    cpu.write_reg(2, 3);
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), BASE_ADDR + 8);

    cpu.reset();
    cpu.write_reg(1, 3);
    cpu.write_reg(2, 4);
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), BASE_ADDR + 4);
}

#[test]
fn test_store_load_round_trip() {
    // sw x5, 0(x6); lw x7, 0(x6)
    let mut cpu = cpu(&[0x00532023, 0x00032383]);
    cpu.write_reg(5, 0xdead_beef);
    cpu.write_reg(6, BASE_ADDR + 0x1000);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.read_reg(7), 0xdead_beef);
    assert_eq!(cpu.read_raw_mem32(BASE_ADDR + 0x1000), Ok(0xdead_beef));
}

#[test]
fn test_illegal_opcode_is_trapped() {
    let mut cpu = cpu(&[0xFFFFFFFF]);
    cpu.write_raw_csr(csr_index::mtvec, HANDLER).unwrap();

    cpu.step().unwrap();
    assert_eq!(cpu.state(), CpuState::Running);
    assert_eq!(cpu.pc(), HANDLER);
    assert_eq!(
        cpu.last_trap(),
        Some(Trap::Exception(Exception::IllegalInstruction, 0xFFFFFFFF))
    );
    assert_eq!(cpu.read_raw_csr(csr_index::mcause), Ok(2));
    assert_eq!(cpu.read_raw_csr(csr_index::mepc), Ok(BASE_ADDR));
    assert_eq!(cpu.read_raw_csr(csr_index::mtval), Ok(0xFFFFFFFF));
}

#[test]
fn test_user_mode_csr_access_is_illegal() {
    // csrrs x1, mstatus, x0
    let raw = 0x300020F3;
    let mut cpu = cpu_with(
        &[raw],
        CpuConfig::default().with_initial_privilege(PrivilegeLevel::U),
    );
    cpu.write_raw_csr(csr_index::mtvec, HANDLER).unwrap();
    cpu.write_reg(1, 0x55);

    cpu.step().unwrap();
    assert_eq!(cpu.read_reg(1), 0x55);
    assert_eq!(cpu.privilege_level(), PrivilegeLevel::M);
    assert_eq!(cpu.pc(), HANDLER);
    assert_eq!(cpu.read_raw_csr(csr_index::mtval), Ok(raw));

    let status = StatusFlags::from_bits_retain(cpu.read_raw_csr(csr_index::mstatus).unwrap());
    assert_eq!(status.mpp(), Some(PrivilegeLevel::U));
}

#[test]
fn test_ecall_delegated_to_supervisor() {
    let mut cpu = cpu_with(
        &[0x00000073],
        CpuConfig::default().with_initial_privilege(PrivilegeLevel::U),
    );
    cpu.write_raw_csr(csr_index::medeleg, 1 << 8).unwrap();
    cpu.write_raw_csr(csr_index::stvec, BASE_ADDR + 0x200).unwrap();

    cpu.step().unwrap();
    assert_eq!(cpu.privilege_level(), PrivilegeLevel::S);
    assert_eq!(cpu.pc(), BASE_ADDR + 0x200);
    assert_eq!(cpu.read_raw_csr(csr_index::scause), Ok(8));
    assert_eq!(cpu.read_raw_csr(csr_index::sepc), Ok(BASE_ADDR));
    assert_eq!(cpu.read_raw_csr(csr_index::mcause), Ok(0));
}

/// Records every physical address that reaches the RAM.
struct TracingBus {
    ram: Ram,
    accesses: Rc<RefCell<Vec<WordType>>>,
}

impl Bus for TracingBus {
    fn read8(&mut self, addr: WordType) -> Result<u8, BusError> {
        self.accesses.borrow_mut().push(addr);
        self.ram.read8(addr)
    }

    fn write8(&mut self, addr: WordType, data: u8) -> Result<(), BusError> {
        self.accesses.borrow_mut().push(addr);
        self.ram.write8(addr, data)
    }
}

const PTE_V: u32 = 1 << 0;
const PTE_R: u32 = 1 << 1;
const PTE_W: u32 = 1 << 2;
const PTE_X: u32 = 1 << 3;
const PTE_A: u32 = 1 << 6;
const PTE_D: u32 = 1 << 7;

/// S-mode hart under Sv32 whose only mapping is an identity megapage over the RAM base.
fn paged_cpu(program: &[u32]) -> (RV32CPU, Rc<RefCell<Vec<WordType>>>) {
    let root = BASE_ADDR + 0x10_0000;
    let mut ram = Ram::new(BASE_ADDR, RAM_SIZE);
    let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    ram.insert_section(&bytes, BASE_ADDR).unwrap();

    let megapage = ((BASE_ADDR >> 12) << 10) | PTE_V | PTE_R | PTE_W | PTE_X | PTE_A | PTE_D;
    let vpn1 = BASE_ADDR >> 22;
    ram.write32(root + 4 * vpn1, megapage).unwrap();

    let accesses = Rc::new(RefCell::new(Vec::new()));
    let bus = TracingBus {
        ram,
        accesses: accesses.clone(),
    };
    let mut cpu = RV32CPU::with_default_sets(
        Box::new(bus),
        CpuConfig::default().with_initial_privilege(PrivilegeLevel::S),
    )
    .unwrap();
    cpu.write_raw_csr(csr_index::satp, (1 << 31) | (root >> 12))
        .unwrap();
    cpu.write_raw_csr(csr_index::mtvec, HANDLER).unwrap();
    (cpu, accesses)
}

#[test]
fn test_page_fault_does_not_touch_bus() {
    let unmapped = 0x1000;

    // lw x5, 0(x6)
    let (mut cpu, accesses) = paged_cpu(&[0x00032283]);
    cpu.write_reg(6, unmapped);
    cpu.step().unwrap();

    assert_eq!(
        cpu.last_trap(),
        Some(Trap::Exception(Exception::LoadPageFault, unmapped))
    );
    assert_eq!(cpu.read_raw_csr(csr_index::mcause), Ok(13));
    assert_eq!(cpu.read_raw_csr(csr_index::mtval), Ok(unmapped));
    assert_eq!(cpu.privilege_level(), PrivilegeLevel::M);
    assert_eq!(cpu.pc(), HANDLER);
    assert!(
        accesses
            .borrow()
            .iter()
            .all(|addr| !(unmapped..unmapped + 4).contains(addr))
    );

    // sw x5, 0(x6)
    let (mut cpu, accesses) = paged_cpu(&[0x00532023]);
    cpu.write_reg(5, 0x1234);
    cpu.write_reg(6, unmapped);
    cpu.step().unwrap();

    assert_eq!(
        cpu.last_trap(),
        Some(Trap::Exception(Exception::StorePageFault, unmapped))
    );
    assert_eq!(cpu.read_raw_csr(csr_index::mcause), Ok(15));
    assert!(
        accesses
            .borrow()
            .iter()
            .all(|addr| !(unmapped..unmapped + 4).contains(addr))
    );
}

#[test]
fn test_mapped_access_under_paging() {
    // sw x5, 0(x6); lw x7, 0(x6)
    let (mut cpu, _) = paged_cpu(&[0x00532023, 0x00032383]);
    cpu.write_reg(5, 0x1234_5678);
    cpu.write_reg(6, BASE_ADDR + 0x2000);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.read_reg(7), 0x1234_5678);
    assert_eq!(cpu.privilege_level(), PrivilegeLevel::S);
    assert_eq!(cpu.last_trap(), None);
}

fn exec_add_twice(cpu: &mut RV32CPU, raw: u32) -> Result<(), Trap> {
    let rd = ((raw >> 7) & 0x1f) as u8;
    let rs1 = ((raw >> 15) & 0x1f) as u8;
    let rs2 = ((raw >> 20) & 0x1f) as u8;
    let sum = cpu.read_reg(rs1).wrapping_add(cpu.read_reg(rs2));
    cpu.write_reg(rd, sum.wrapping_mul(2));
    cpu.set_pc(cpu.pc().wrapping_add(4));
    Ok(())
}

static SHADOWING_SET: InstructionSet = InstructionSet {
    name: "shadowing",
    extensions: "",
    instructions: &[Instruction::r("ADD_TWICE", 0b0110011, 0b000, 0, exec_add_twice)],
    csrs: &[],
};

#[test]
fn test_shadow_policy() {
    let bus = || Box::new(Ram::new(BASE_ADDR, RAM_SIZE));
    let sets: &[&InstructionSet] = &[&RV32I, &ZICSR, &PRIVILEGED, &SHADOWING_SET];

    let err = RV32CPU::new(bus(), sets, CpuConfig::default()).err();
    assert!(matches!(
        err,
        Some(ConfigError::DuplicateInstruction {
            name: "ADD_TWICE",
            existing: "ADD",
            ..
        })
    ));

    let config = CpuConfig::default().with_shadow_policy(ShadowPolicy::Replace);
    let mut cpu = RV32CPU::new(bus(), sets, config).unwrap();
    // add x3, x1, x2
    cpu.write_raw_mem32(BASE_ADDR, 0x002081B3).unwrap();
    cpu.write_reg(1, 2);
    cpu.write_reg(2, 3);
    cpu.step().unwrap();
    assert_eq!(cpu.read_reg(3), 10);
}

#[test]
fn test_trap_delivery_failure_halts() {
    let mut ram = Ram::new(BASE_ADDR, RAM_SIZE);
    ram.write32(BASE_ADDR, 0xFFFFFFFF).unwrap();
    let mut cpu = RV32CPU::new(Box::new(ram), &[&RV32I], CpuConfig::default()).unwrap();

    let report = cpu.run();
    assert!(matches!(
        report.cause,
        CpuError::TrapDelivery {
            trap: Trap::Exception(Exception::IllegalInstruction, _),
            ..
        }
    ));
    assert_eq!(
        report.last_trap,
        Some(Trap::Exception(Exception::IllegalInstruction, 0xFFFFFFFF))
    );
    assert_eq!(report.pc, BASE_ADDR);
    assert_eq!(cpu.state(), CpuState::Halted);
    assert_eq!(cpu.step(), Err(CpuError::Halted));
}

#[test]
fn test_vectored_timer_interrupt() {
    let mut program = vec![NOP; 0x100 / 4];
    program.extend([NOP; 7]);
    program.push(MRET); // HANDLER + 4 * 7
    let mut cpu = cpu(&program);

    cpu.write_raw_csr(csr_index::mtvec, HANDLER | 1).unwrap();
    cpu.write_raw_csr(csr_index::mie, Interrupt::MachineTimer.mask())
        .unwrap();
    cpu.write_raw_csr(csr_index::mstatus, StatusFlags::MIE.bits())
        .unwrap();
    cpu.set_interrupt_pending(Interrupt::MachineTimer, true).unwrap();

    cpu.step().unwrap();
    assert_eq!(cpu.pc(), HANDLER + 4 * 7);
    assert_eq!(cpu.read_raw_csr(csr_index::mcause), Ok(0x8000_0007));
    assert_eq!(cpu.read_raw_csr(csr_index::mepc), Ok(BASE_ADDR));
    let status = StatusFlags::from_bits_retain(cpu.read_raw_csr(csr_index::mstatus).unwrap());
    assert!(!status.contains(StatusFlags::MIE));
    assert!(status.contains(StatusFlags::MPIE));
    // The interrupt did not retire an instruction.
    assert_eq!(cpu.read_raw_csr(csr_index::minstret), Ok(0));

    cpu.set_interrupt_pending(Interrupt::MachineTimer, false).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), BASE_ADDR);
    let status = StatusFlags::from_bits_retain(cpu.read_raw_csr(csr_index::mstatus).unwrap());
    assert!(status.contains(StatusFlags::MIE));
}

#[test]
fn test_ebreak_halts() {
    let mut cpu = cpu_with(
        &[NOP, NOP, EBREAK],
        CpuConfig::default().with_halt_on_breakpoint(true),
    );
    let report = cpu.run();
    assert_eq!(report.cause, CpuError::Breakpoint { pc: BASE_ADDR + 8 });
    assert_eq!(report.pc, BASE_ADDR + 8);
    assert_eq!(cpu.state(), CpuState::Halted);
}

#[test]
fn test_run_until() {
    // addi x1, x1, 1; jal x0, -4
    let mut cpu = cpu(&[0x00108093, 0xFFDFF06F]);
    let report = cpu.run_until(|cpu, _| cpu.read_reg(1) == 10);
    assert!(report.is_none());
    assert_eq!(cpu.pc(), BASE_ADDR + 4);
    assert_eq!(cpu.read_raw_csr(csr_index::minstret), Ok(19));

    let mut steps_taken = 0;
    cpu.run_until(|_, steps| {
        steps_taken = steps;
        steps == 6
    });
    assert_eq!(steps_taken, 6);
    assert_eq!(cpu.read_reg(1), 13);
}
