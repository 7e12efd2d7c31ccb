use std::fmt::Display;

use smallvec::SmallVec;

use crate::{
    config::{CpuConfig, arch_config::WordType},
    cpu::{FloatRegFile, RegFile},
    device::{Bus, BusError},
    isa::riscv::{
        csr_reg::{CsrInfo, CsrRegFile, PrivilegeLevel, csr_index},
        decoder::InstructionTable,
        default_instruction_sets,
        error::{ConfigError, CpuError},
        instruction::InstructionSet,
        mmu::{AccessType, Mmu},
        trap::{Exception, Interrupt, Trap, trap_controller::TrapController},
    },
    utils::check_align,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    Halted,
}

/// Machine state captured when the run loop stops.
#[derive(Debug, Clone)]
pub struct HaltReport {
    pub cause: CpuError,
    pub last_trap: Option<Trap>,
    pub pc: WordType,
    pub registers: RegFile,
}

impl Display for HaltReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "halted at {:#010x}: {}", self.pc, self.cause)?;
        if let Some(trap) = self.last_trap {
            writeln!(f, "last trap: {trap}")?;
        }
        write!(f, "{:?}", self.registers)
    }
}

/// `misa` for the loaded sets: MXL = 1 plus one bit per extension letter.
fn misa_value(sets: &[&InstructionSet]) -> WordType {
    sets.iter()
        .flat_map(|set| set.extensions.chars())
        .filter(char::is_ascii_uppercase)
        .map(|c| c as WordType - 'A' as WordType)
        .fold(1 << (WordType::BITS - 2), |acc, bit| acc | (1 << bit))
}

pub struct RV32CPU {
    pub(super) reg_file: RegFile,
    pub(super) float_reg_file: FloatRegFile,
    pub(super) memory: Mmu,
    pub(super) pc: WordType,
    pub(super) decoder: InstructionTable,
    pub(super) csr: CsrRegFile,

    config: CpuConfig,
    state: CpuState,
    last_trap: Option<Trap>,
}

impl RV32CPU {
    /// Build a hart over `bus` that understands exactly the instructions and CSRs of `sets`.
    pub fn new(
        bus: Box<dyn Bus>,
        sets: &[&InstructionSet],
        config: CpuConfig,
    ) -> Result<Self, ConfigError> {
        let decoder = InstructionTable::from_sets(sets, config.shadow_policy)?;
        let mut csr = CsrRegFile::from_sets(sets, config.shadow_policy)?;

        // Sets without the privileged CSRs have no misa.
        let _ = csr.set_reset_value(csr_index::misa, misa_value(sets));
        csr.set_current_privileged(config.initial_privilege);

        log::info!(
            "cpu ready: {} instructions, {} CSRs, reset vector {:#010x}",
            decoder.len(),
            csr.infos().len(),
            config.reset_vector
        );

        Ok(Self {
            reg_file: RegFile::new(),
            float_reg_file: FloatRegFile::new(),
            memory: Mmu::new(bus),
            pc: config.reset_vector,
            decoder,
            csr,
            config,
            state: CpuState::Running,
            last_trap: None,
        })
    }

    /// RV32I, M, Zicsr, Zicntr and the privileged architecture.
    pub fn with_default_sets(bus: Box<dyn Bus>, config: CpuConfig) -> Result<Self, ConfigError> {
        Self::new(bus, &default_instruction_sets(), config)
    }

    /// Back to the reset state. Memory is left untouched.
    pub fn reset(&mut self) {
        self.reg_file = RegFile::new();
        self.float_reg_file = FloatRegFile::new();
        self.csr.reset();
        self.csr.set_current_privileged(self.config.initial_privilege);
        self.pc = self.config.reset_vector;
        self.state = CpuState::Running;
        self.last_trap = None;
    }

    /// Execute one instruction, or take one pending interrupt.
    ///
    /// Guest-visible traps are delivered and return `Ok`. An `Err` means the hart stopped; every
    /// later call returns [`CpuError::Halted`] until [`Self::reset`].
    pub fn step(&mut self) -> Result<(), CpuError> {
        if self.state == CpuState::Halted {
            return Err(CpuError::Halted);
        }

        let outcome = self.execute_one();
        self.csr.tick(matches!(outcome, Ok(true)));

        match outcome {
            Ok(_) => Ok(()),
            Err(err) => {
                self.halt(&err);
                Err(err)
            }
        }
    }

    /// `Ok(true)` if an instruction retired.
    fn execute_one(&mut self) -> Result<bool, CpuError> {
        if let Some(interrupt) = TrapController::pending_interrupt(self)? {
            log::debug!("taking {:?} at {:#010x}", interrupt, self.pc);
            return self.deliver(Trap::Interrupt(interrupt, 0));
        }

        // IF
        let raw = match self.fetch() {
            Ok(raw) => raw,
            Err(trap) => return self.deliver(trap),
        };

        // ID
        let Some(instr) = self.decoder.decode(raw) else {
            log::warn!("Illegal instruction: {:#010x} at {:#010x}", raw, self.pc);
            return self.deliver(Exception::IllegalInstruction.with_tval(raw));
        };
        let (name, exec) = (instr.name, instr.exec);
        log::trace!("{:#010x}: {:08x} {}", self.pc, raw, name);

        // EX && MEM && WB
        match exec(self, raw) {
            Ok(()) => Ok(true),
            Err(Trap::Exception(Exception::Breakpoint, _)) if self.config.halt_on_breakpoint => {
                Err(CpuError::Breakpoint { pc: self.pc })
            }
            Err(trap) => self.deliver(trap),
        }
    }

    fn fetch(&mut self) -> Result<u32, Trap> {
        let pc = self.pc;
        if !check_align(pc, 4) {
            return Err(Exception::InstructionMisaligned.with_tval(pc));
        }
        let paddr = self
            .memory
            .translate(&self.csr, pc, AccessType::Fetch)
            .map_err(|e| e.with_tval(pc))?;
        self.memory
            .bus()
            .read32(paddr)
            .map_err(|_| Exception::InstructionFault.with_tval(pc))
    }

    fn deliver(&mut self, trap: Trap) -> Result<bool, CpuError> {
        log::debug!("trap {} at {:#010x}", trap, self.pc);
        self.last_trap = Some(trap);
        TrapController::send_trap_signal(self, trap).map_err(|source| {
            CpuError::TrapDelivery {
                trap,
                source: Box::new(source),
            }
        })?;
        Ok(false)
    }

    fn halt(&mut self, cause: &CpuError) {
        self.state = CpuState::Halted;
        log::error!("cpu halted at {:#010x}: {}", self.pc, cause);
        if self.config.dump_registers_on_halt {
            log::error!("{}", self.dump_registers());
        }
    }

    fn report(&self, cause: CpuError) -> HaltReport {
        HaltReport {
            cause,
            last_trap: self.last_trap,
            pc: self.pc,
            registers: self.reg_file.clone(),
        }
    }

    /// Step until the hart halts.
    pub fn run(&mut self) -> HaltReport {
        loop {
            if let Err(cause) = self.step() {
                return self.report(cause);
            }
        }
    }

    /// Step until `stop` returns true or the hart halts. `stop` sees the number of steps taken
    /// so far. `None` means the hart is still running.
    pub fn run_until<F>(&mut self, mut stop: F) -> Option<HaltReport>
    where
        F: FnMut(&RV32CPU, u64) -> bool,
    {
        let mut steps = 0u64;
        while !stop(self, steps) {
            if let Err(cause) = self.step() {
                return Some(self.report(cause));
            }
            steps += 1;
        }
        None
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn last_trap(&self) -> Option<Trap> {
        self.last_trap
    }

    pub fn pc(&self) -> WordType {
        self.pc
    }

    pub fn set_pc(&mut self, pc: WordType) {
        self.pc = pc;
    }

    pub fn read_reg(&self, id: u8) -> WordType {
        self.reg_file[id as usize]
    }

    pub fn write_reg(&mut self, id: u8, value: WordType) {
        self.reg_file.write(id, value);
    }

    pub fn registers(&self) -> &RegFile {
        &self.reg_file
    }

    pub fn float_registers(&self) -> &FloatRegFile {
        &self.float_reg_file
    }

    pub fn float_registers_mut(&mut self) -> &mut FloatRegFile {
        &mut self.float_reg_file
    }

    pub fn dump_registers(&self) -> String {
        format!("pc: {:#010x}\n{:?}", self.pc, self.reg_file)
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        self.csr.privilege_level()
    }

    pub fn set_privilege_level(&mut self, level: PrivilegeLevel) {
        self.csr.set_current_privileged(level);
    }

    /// Drive the `mip` bit of `irq`. This is the platform side, so the M bits are writable here.
    pub fn set_interrupt_pending(&mut self, irq: Interrupt, level: bool) -> Result<(), CpuError> {
        let mip = self.read_raw_csr(csr_index::mip)?;
        let mip = if level {
            mip | irq.mask()
        } else {
            mip & !irq.mask()
        };
        self.csr
            .write_directly(csr_index::mip, mip)
            .ok_or(CpuError::UnknownCsr(csr_index::mip))
    }

    pub fn bus_mut(&mut self) -> &mut dyn Bus {
        self.memory.bus()
    }

    pub fn instruction_table(&self) -> &InstructionTable {
        &self.decoder
    }
}

// Checked memory access. Addresses are virtual and faults come back as traps carrying `vaddr`.
impl RV32CPU {
    fn translate(&mut self, vaddr: WordType, access: AccessType) -> Result<WordType, Trap> {
        self.memory
            .translate(&self.csr, vaddr, access)
            .map_err(|e| e.with_tval(vaddr))
    }

    fn load(&mut self, vaddr: WordType, size: u8) -> Result<WordType, Trap> {
        if !check_align(vaddr, size) {
            if !self.config.misaligned_access {
                return Err(Exception::LoadMisaligned.with_tval(vaddr));
            }
            let mut value = 0;
            for i in 0..size {
                let addr = vaddr.wrapping_add(i as WordType);
                let paddr = self.translate(addr, AccessType::Load)?;
                let byte = self
                    .memory
                    .bus()
                    .read8(paddr)
                    .map_err(|_| Exception::LoadFault.with_tval(addr))?;
                value |= (byte as WordType) << (8 * i);
            }
            return Ok(value);
        }

        let paddr = self.translate(vaddr, AccessType::Load)?;
        let bus = self.memory.bus();
        let value = match size {
            1 => bus.read8(paddr).map(WordType::from),
            2 => bus.read16(paddr).map(WordType::from),
            _ => bus.read32(paddr),
        };
        value.map_err(|_| Exception::LoadFault.with_tval(vaddr))
    }

    fn store(&mut self, vaddr: WordType, size: u8, data: WordType) -> Result<(), Trap> {
        if !check_align(vaddr, size) {
            if !self.config.misaligned_access {
                return Err(Exception::StoreMisaligned.with_tval(vaddr));
            }
            // Translate every byte first so a page fault leaves memory untouched. A bus error
            // partway through keeps the bytes already written.
            let paddrs = (0..size)
                .map(|i| self.translate(vaddr.wrapping_add(i as WordType), AccessType::Store))
                .collect::<Result<SmallVec<[WordType; 4]>, Trap>>()?;
            for (i, paddr) in paddrs.into_iter().enumerate() {
                let byte_addr = vaddr.wrapping_add(i as WordType);
                self.memory
                    .bus()
                    .write8(paddr, (data >> (8 * i)) as u8)
                    .map_err(|_| Exception::StoreFault.with_tval(byte_addr))?;
            }
            return Ok(());
        }

        let paddr = self.translate(vaddr, AccessType::Store)?;
        let bus = self.memory.bus();
        let result = match size {
            1 => bus.write8(paddr, data as u8),
            2 => bus.write16(paddr, data as u16),
            _ => bus.write32(paddr, data),
        };
        result.map_err(|_| Exception::StoreFault.with_tval(vaddr))
    }

    pub fn read_mem8(&mut self, vaddr: WordType) -> Result<u8, Trap> {
        self.load(vaddr, 1).map(|v| v as u8)
    }

    pub fn read_mem16(&mut self, vaddr: WordType) -> Result<u16, Trap> {
        self.load(vaddr, 2).map(|v| v as u16)
    }

    pub fn read_mem32(&mut self, vaddr: WordType) -> Result<u32, Trap> {
        self.load(vaddr, 4)
    }

    pub fn write_mem8(&mut self, vaddr: WordType, data: u8) -> Result<(), Trap> {
        self.store(vaddr, 1, data as WordType)
    }

    pub fn write_mem16(&mut self, vaddr: WordType, data: u16) -> Result<(), Trap> {
        self.store(vaddr, 2, data as WordType)
    }

    pub fn write_mem32(&mut self, vaddr: WordType, data: u32) -> Result<(), Trap> {
        self.store(vaddr, 4, data)
    }

    /// Fill `buf` from consecutive virtual addresses.
    pub fn read_mem(&mut self, vaddr: WordType, buf: &mut [u8]) -> Result<(), Trap> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_mem8(vaddr.wrapping_add(i as WordType))?;
        }
        Ok(())
    }

    pub fn write_mem(&mut self, vaddr: WordType, data: &[u8]) -> Result<(), Trap> {
        for (i, byte) in data.iter().enumerate() {
            self.write_mem8(vaddr.wrapping_add(i as WordType), *byte)?;
        }
        Ok(())
    }
}

// Raw memory access: physical addresses, no translation and no traps.
impl RV32CPU {
    pub fn read_raw_mem8(&mut self, paddr: WordType) -> Result<u8, BusError> {
        self.memory.bus().read8(paddr)
    }

    pub fn read_raw_mem16(&mut self, paddr: WordType) -> Result<u16, BusError> {
        self.memory.bus().read16(paddr)
    }

    pub fn read_raw_mem32(&mut self, paddr: WordType) -> Result<u32, BusError> {
        self.memory.bus().read32(paddr)
    }

    pub fn write_raw_mem8(&mut self, paddr: WordType, data: u8) -> Result<(), BusError> {
        self.memory.bus().write8(paddr, data)
    }

    pub fn write_raw_mem16(&mut self, paddr: WordType, data: u16) -> Result<(), BusError> {
        self.memory.bus().write16(paddr, data)
    }

    pub fn write_raw_mem32(&mut self, paddr: WordType, data: u32) -> Result<(), BusError> {
        self.memory.bus().write32(paddr, data)
    }

    pub fn read_raw_mem(&mut self, paddr: WordType, buf: &mut [u8]) -> Result<(), BusError> {
        let bus = self.memory.bus();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = bus.read8(paddr.wrapping_add(i as WordType))?;
        }
        Ok(())
    }

    pub fn write_raw_mem(&mut self, paddr: WordType, data: &[u8]) -> Result<(), BusError> {
        let bus = self.memory.bus();
        for (i, byte) in data.iter().enumerate() {
            bus.write8(paddr.wrapping_add(i as WordType), *byte)?;
        }
        Ok(())
    }
}

// CSR access. The checked pair is what instructions use; the raw pair is for the core itself and
// the embedder.
impl RV32CPU {
    pub fn read_csr(&self, addr: WordType) -> Result<WordType, Exception> {
        self.csr.read(addr)
    }

    pub fn write_csr(&mut self, addr: WordType, data: WordType) -> Result<(), Exception> {
        self.csr.write(addr, data)
    }

    pub fn read_raw_csr(&self, addr: WordType) -> Result<WordType, CpuError> {
        self.csr
            .read_uncheck_privilege(addr)
            .ok_or(CpuError::UnknownCsr(addr))
    }

    pub fn write_raw_csr(&mut self, addr: WordType, data: WordType) -> Result<(), CpuError> {
        self.csr
            .write_uncheck_privilege(addr, data)
            .ok_or(CpuError::UnknownCsr(addr))
    }

    pub fn get_raw_csr(&self, addr: WordType) -> Result<CsrInfo, CpuError> {
        self.csr.info(addr).ok_or(CpuError::UnknownCsr(addr))
    }

    pub fn csr_infos(&self) -> Vec<CsrInfo> {
        self.csr.infos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        isa::riscv::{
            cpu_tester::*,
            instruction::{
                privileged::PRIVILEGED, rv32i::RV32I, rv32m::RV32M, zicntr::ZICNTR, zicsr::ZICSR,
            },
        },
        ram::Ram,
        ram_config::BASE_ADDR,
    };

    const EBREAK: u32 = 0x00100073;
    const NOP: u32 = 0x00000013;

    fn cpu_with(sets: &[&InstructionSet], config: CpuConfig) -> RV32CPU {
        let mut cpu = RV32CPU::new(Box::new(Ram::new(BASE_ADDR, 0x1000)), sets, config).unwrap();
        cpu.write_raw_mem32(BASE_ADDR, NOP).unwrap();
        cpu
    }

    #[test]
    fn test_misa() {
        let cpu = TestCPUBuilder::new().build();
        let letters = |s: &str| s.chars().fold(0, |acc, c| acc | 1 << (c as u32 - 'A' as u32));
        assert_eq!(
            cpu.read_raw_csr(csr_index::misa),
            Ok((1 << 30) | letters("IMSU"))
        );

        let cpu = cpu_with(&[&RV32I, &ZICSR, &PRIVILEGED], CpuConfig::default());
        assert_eq!(
            cpu.read_raw_csr(csr_index::misa),
            Ok((1 << 30) | letters("ISU"))
        );
    }

    #[test]
    fn test_counters() {
        let mut cpu = TestCPUBuilder::new()
            .program(&[NOP, 0xFFFFFFFF, NOP])
            .build();
        cpu.csr.write_directly(csr_index::mtvec, BASE_ADDR + 8).unwrap();

        cpu.step().unwrap();
        cpu.step().unwrap(); // illegal, trapped to mtvec
        cpu.step().unwrap();

        assert_eq!(cpu.pc(), BASE_ADDR + 12);
        assert_eq!(cpu.read_raw_csr(csr_index::mcycle), Ok(3));
        assert_eq!(cpu.read_raw_csr(csr_index::minstret), Ok(2));
        assert_eq!(cpu.read_raw_csr(csr_index::cycle), Ok(3));
        assert_eq!(cpu.read_raw_csr(csr_index::instret), Ok(2));
    }

    #[test]
    fn test_illegal_instruction_trap() {
        let mut cpu = TestCPUBuilder::new().program(&[0xFFFFFFFF]).build();
        cpu.csr.write_directly(csr_index::mtvec, BASE_ADDR + 0x40).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.pc(), BASE_ADDR + 0x40);
        assert_eq!(
            cpu.last_trap(),
            Some(Exception::IllegalInstruction.with_tval(0xFFFFFFFF))
        );
        assert_eq!(cpu.read_raw_csr(csr_index::mepc), Ok(BASE_ADDR));
        assert_eq!(cpu.read_raw_csr(csr_index::mtval), Ok(0xFFFFFFFF));
        assert_eq!(cpu.state(), CpuState::Running);
    }

    #[test]
    fn test_fetch_faults() {
        let mut cpu = TestCPUBuilder::new().pc(BASE_ADDR + 2).build();
        cpu.csr.write_directly(csr_index::mtvec, BASE_ADDR + 0x40).unwrap();
        cpu.step().unwrap();
        assert_eq!(
            cpu.last_trap(),
            Some(Exception::InstructionMisaligned.with_tval(BASE_ADDR + 2))
        );

        let mut cpu = TestCPUBuilder::new().pc(0x1000).build();
        cpu.csr.write_directly(csr_index::mtvec, BASE_ADDR + 0x40).unwrap();
        cpu.step().unwrap();
        assert_eq!(
            cpu.last_trap(),
            Some(Exception::InstructionFault.with_tval(0x1000))
        );
        assert_eq!(cpu.pc(), BASE_ADDR + 0x40);
    }

    #[test]
    fn test_trap_delivery_failure_halts() {
        // Without the privileged set there is nowhere to deliver a trap.
        let mut cpu = cpu_with(&[&RV32I], CpuConfig::default());
        cpu.write_raw_mem32(BASE_ADDR, 0xFFFFFFFF).unwrap();

        let err = cpu.step().unwrap_err();
        assert!(matches!(
            err,
            CpuError::TrapDelivery {
                trap: Trap::Exception(Exception::IllegalInstruction, 0xFFFFFFFF),
                ..
            }
        ));
        assert_eq!(cpu.state(), CpuState::Halted);
        assert_eq!(cpu.step(), Err(CpuError::Halted));

        cpu.reset();
        assert_eq!(cpu.state(), CpuState::Running);
        assert_eq!(cpu.last_trap(), None);
    }

    #[test]
    fn test_breakpoint() {
        // Delivered to the guest by default.
        let mut cpu = TestCPUBuilder::new().program(&[EBREAK]).build();
        cpu.csr.write_directly(csr_index::mtvec, BASE_ADDR + 0x40).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), BASE_ADDR + 0x40);
        assert_eq!(cpu.read_raw_csr(csr_index::mcause), Ok(3));

        let mut cpu = TestCPUBuilder::new()
            .with_config(CpuConfig::default().with_halt_on_breakpoint(true))
            .program(&[NOP, EBREAK])
            .build();
        let report = cpu.run();
        assert_eq!(report.cause, CpuError::Breakpoint { pc: BASE_ADDR + 4 });
        assert_eq!(report.pc, BASE_ADDR + 4);
        assert_eq!(report.last_trap, None);
        assert_eq!(cpu.read_raw_csr(csr_index::minstret), Ok(1));
        assert!(report.to_string().starts_with("halted at 0x80000004: breakpoint"));
    }

    #[test]
    fn test_run_until() {
        // jal x0, 0
        let mut cpu = TestCPUBuilder::new().program(&[0x0000006F]).build();
        assert!(cpu.run_until(|_, steps| steps == 100).is_none());
        assert_eq!(cpu.read_raw_csr(csr_index::mcycle), Ok(100));
        assert_eq!(cpu.pc(), BASE_ADDR);

        let mut cpu = TestCPUBuilder::new()
            .with_config(CpuConfig::default().with_halt_on_breakpoint(true))
            .program(&[NOP, NOP, EBREAK])
            .build();
        let report = cpu.run_until(|_, steps| steps == 100).unwrap();
        assert_eq!(report.pc, BASE_ADDR + 8);

        let mut cpu = TestCPUBuilder::new().program(&[NOP, NOP]).build();
        cpu.run_until(|cpu, _| cpu.pc() == BASE_ADDR + 8);
        assert_eq!(cpu.read_raw_csr(csr_index::minstret), Ok(2));
    }

    #[test]
    fn test_misaligned_access() {
        let addr = BASE_ADDR + 0x101;
        let mut cpu = TestCPUBuilder::new().build();
        assert_eq!(
            cpu.write_mem32(addr, 0x1234_5678),
            Err(Exception::StoreMisaligned.with_tval(addr))
        );
        assert_eq!(
            cpu.read_mem16(addr),
            Err(Exception::LoadMisaligned.with_tval(addr))
        );

        let mut cpu = TestCPUBuilder::new()
            .with_config(CpuConfig::default().with_misaligned_access(true))
            .build();
        cpu.write_mem32(addr, 0x1234_5678).unwrap();
        assert_eq!(cpu.read_mem32(addr), Ok(0x1234_5678));
        assert_eq!(cpu.read_mem16(addr + 2), Ok(0x1234));
        assert_eq!(cpu.read_raw_mem32(BASE_ADDR + 0x100), Ok(0x3456_7800));

        // Crossing the end of RAM faults on the first missing byte.
        let ram_end = BASE_ADDR + (1 << 20);
        assert_eq!(
            cpu.write_mem32(ram_end - 2, 0xAABB_CCDD),
            Err(Exception::StoreFault.with_tval(ram_end))
        );
        assert_eq!(cpu.read_raw_mem16(ram_end - 2), Ok(0xCCDD));
    }

    #[test]
    fn test_bulk_and_raw_memory() {
        let mut cpu = TestCPUBuilder::new().build();
        cpu.write_mem(BASE_ADDR + 0x10, b"hello").unwrap();
        let mut buf = [0u8; 5];
        cpu.read_raw_mem(BASE_ADDR + 0x10, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        assert!(cpu.read_raw_mem8(0x10).is_err());
        assert_eq!(
            cpu.read_mem8(0x10),
            Err(Exception::LoadFault.with_tval(0x10))
        );
        assert_eq!(
            cpu.write_mem16(0x10, 1),
            Err(Exception::StoreFault.with_tval(0x10))
        );
    }

    #[test]
    fn test_unknown_csr() {
        let mut cpu = cpu_with(&[&RV32I, &RV32M], CpuConfig::default());
        assert_eq!(
            cpu.read_raw_csr(csr_index::mstatus),
            Err(CpuError::UnknownCsr(csr_index::mstatus))
        );
        assert_eq!(
            cpu.set_interrupt_pending(Interrupt::MachineTimer, true),
            Err(CpuError::UnknownCsr(csr_index::mip))
        );
        assert!(cpu.csr_infos().is_empty());

        let cpu = cpu_with(&[&ZICNTR], CpuConfig::default());
        assert_eq!(
            cpu.get_raw_csr(csr_index::cycle).map(|info| info.name),
            Ok("cycle")
        );
    }

    #[test]
    fn test_set_interrupt_pending() {
        let mut cpu = TestCPUBuilder::new().build();
        cpu.set_interrupt_pending(Interrupt::MachineTimer, true).unwrap();
        cpu.set_interrupt_pending(Interrupt::SupervisorSoft, true).unwrap();
        assert_eq!(cpu.read_raw_csr(csr_index::mip), Ok(0x82));

        cpu.set_interrupt_pending(Interrupt::MachineTimer, false).unwrap();
        assert_eq!(cpu.read_raw_csr(csr_index::mip), Ok(0x02));
    }

    #[test]
    fn test_reset() {
        let mut cpu = TestCPUBuilder::new()
            .with_config(CpuConfig::default().with_initial_privilege(PrivilegeLevel::S))
            .program(&[0x00500093]) // addi x1, x0, 5
            .build();
        cpu.step().unwrap();
        cpu.float_registers_mut().write_bits(1, 0x3f80_0000);
        assert_eq!(cpu.read_reg(1), 5);

        cpu.reset();
        assert_eq!(cpu.read_reg(1), 0);
        assert_eq!(cpu.float_registers().read_bits(1), 0);
        assert_eq!(cpu.pc(), BASE_ADDR);
        assert_eq!(cpu.privilege_level(), PrivilegeLevel::S);
        assert_eq!(cpu.read_raw_csr(csr_index::mcycle), Ok(0));
        // Memory survives.
        assert_eq!(cpu.read_raw_mem32(BASE_ADDR), Ok(0x00500093));
    }

    #[test]
    fn test_default_sets() {
        let cpu =
            RV32CPU::with_default_sets(Box::new(Ram::new(BASE_ADDR, 0x1000)), CpuConfig::default())
                .unwrap();
        let expected: usize = [&RV32I, &RV32M, &ZICSR, &ZICNTR, &PRIVILEGED]
            .iter()
            .map(|set| set.instructions.len())
            .sum();
        assert_eq!(cpu.instruction_table().len(), expected);
        assert!(cpu.dump_registers().starts_with("pc: 0x80000000"));
    }
}
