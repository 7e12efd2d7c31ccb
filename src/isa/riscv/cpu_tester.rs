#![cfg(test)]
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::{
    config::{
        CpuConfig,
        arch_config::{REGFILE_CNT, WordType},
    },
    isa::riscv::{csr_reg::PrivilegeLevel, executor::RV32CPU, trap::Trap},
    ram::Ram,
    ram_config::BASE_ADDR,
    utils::sign_extend,
};

const TEST_RAM_SIZE: usize = 1 << 20;

pub(super) struct TestCPUBuilder {
    cpu: RV32CPU,
}

impl TestCPUBuilder {
    pub(super) fn new() -> Self {
        Self::with_config_inner(CpuConfig::default())
    }

    fn with_config_inner(config: CpuConfig) -> Self {
        let ram = Ram::new(BASE_ADDR, TEST_RAM_SIZE);
        Self {
            cpu: RV32CPU::with_default_sets(Box::new(ram), config.with_reset_vector(BASE_ADDR))
                .unwrap(),
        }
    }

    /// Start over with `config`. Call first, it rebuilds the CPU.
    pub(super) fn with_config(self, config: CpuConfig) -> Self {
        Self::with_config_inner(config)
    }

    pub(super) fn reg(mut self, idx: u8, value: WordType) -> Self {
        self.cpu.reg_file.write(idx, value);
        self
    }

    pub(super) fn pc(mut self, value: WordType) -> Self {
        self.cpu.pc = value;
        self
    }

    pub(super) fn mem(mut self, addr: WordType, value: u32) -> Self {
        self.cpu.write_raw_mem32(addr, value).unwrap();
        self
    }

    pub(super) fn program(mut self, instrs: &[u32]) -> Self {
        for (i, instr) in instrs.iter().enumerate() {
            self = self.mem(BASE_ADDR + 4 * i as WordType, *instr);
        }
        self
    }

    pub(super) fn csr(mut self, csr_addr: WordType, value: WordType) -> Self {
        self.cpu.csr.write_directly(csr_addr, value).unwrap();
        self
    }

    pub(super) fn privilege(mut self, level: PrivilegeLevel) -> Self {
        self.cpu.csr.set_current_privileged(level);
        self
    }

    pub(super) fn build(self) -> RV32CPU {
        self.cpu
    }
}

pub(super) struct CPUChecker<'a> {
    pub(super) cpu: &'a mut RV32CPU,
}

impl<'a> CPUChecker<'a> {
    pub(super) fn new(cpu: &'a mut RV32CPU) -> Self {
        Self { cpu }.reg(0, 0) // x0 is always 0
    }

    pub(super) fn reg(self, idx: u8, value: WordType) -> Self {
        assert_eq!(
            self.cpu.reg_file.read(idx, 0).0,
            value,
            "Register #{} incorrect",
            idx,
        );
        self
    }

    pub(super) fn pc(self, value: WordType) -> Self {
        assert_eq!(self.cpu.pc, value, "PC incorrect");
        self
    }

    pub(super) fn mem(self, addr: WordType, value: u32) -> Self {
        assert_eq!(
            self.cpu.read_raw_mem32(addr).unwrap(),
            value,
            "Memory value incorrect at {:#x}",
            addr
        );
        self
    }

    pub(super) fn csr(self, addr: WordType, value: WordType) -> Self {
        assert_eq!(
            self.cpu.csr.read_uncheck_privilege(addr).unwrap(),
            value,
            "CSR {:#x} incorrect",
            addr
        );
        self
    }

    pub(super) fn privilege(self, level: PrivilegeLevel) -> Self {
        assert_eq!(self.cpu.privilege_level(), level, "Privilege level incorrect");
        self
    }

    pub(super) fn customized<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        f(self)
    }
}

pub(super) struct ExecOutcome {
    pub(super) cpu: RV32CPU,
    pub(super) exec_result: Result<(), Trap>,
}

/// Decode and execute `raw_instr` once, without fetch or trap delivery. `check` runs whether or
/// not the instruction raised a trap.
pub(super) fn run_test_exec_decode<F, G>(raw_instr: u32, build: F, check: G) -> ExecOutcome
where
    F: FnOnce(TestCPUBuilder) -> TestCPUBuilder,
    G: FnOnce(CPUChecker) -> CPUChecker,
{
    let mut cpu = build(TestCPUBuilder::new()).build();
    let exec = cpu
        .decoder
        .decode(raw_instr)
        .unwrap_or_else(|| panic!("{raw_instr:#010x} does not decode"))
        .exec;
    let exec_result = exec(&mut cpu, raw_instr);
    check(CPUChecker::new(&mut cpu));
    ExecOutcome { cpu, exec_result }
}

/// Load `raw_instrs` at the reset vector and step once per instruction.
pub(super) fn run_test_cpu_step<F, G>(raw_instrs: &[u32], build: F, check: G)
where
    F: FnOnce(TestCPUBuilder) -> TestCPUBuilder,
    G: FnOnce(CPUChecker) -> CPUChecker,
{
    let mut cpu = build(TestCPUBuilder::new()).program(raw_instrs).build();
    for _ in 0..raw_instrs.len() {
        cpu.step().unwrap()
    }
    check(CPUChecker::new(&mut cpu));
}

pub(super) struct ExecTester {
    rng: ChaCha12Rng,
}

impl ExecTester {
    const PC: WordType = BASE_ADDR + 0x1000;

    pub(super) fn new() -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(0721),
        }
    }

    pub(super) fn rand_imm12(&mut self) -> WordType {
        self.rng.random_range(0..=4095) as WordType
    }

    pub(super) fn rand_word(&mut self) -> WordType {
        self.rng.random_range(0..=WordType::MAX)
    }

    pub(super) fn rand_reg_idx(&mut self) -> u8 {
        self.rng.random_range(1..REGFILE_CNT) as u8
    }

    pub(super) fn rand_unique_reg_idx2(&mut self) -> (u8, u8) {
        let idx1 = self.rand_reg_idx();
        let mut idx2 = self.rand_reg_idx();
        while idx1 == idx2 {
            idx2 = self.rand_reg_idx();
        }
        (idx1, idx2)
    }

    pub(super) fn test_rand_r_with(
        &mut self,
        opcode: u8,
        funct3: u8,
        funct7: u8,
        lhs: WordType,
        rhs: WordType,
        expected: WordType,
    ) {
        let rd = self.rand_reg_idx();
        let (rs1, rs2) = self.rand_unique_reg_idx2();
        let raw = encode::r(opcode, funct3, funct7, rd, rs1, rs2);

        run_test_exec_decode(
            raw,
            |builder| builder.reg(rs1, lhs).reg(rs2, rhs).pc(Self::PC),
            |checker| checker.reg(rd, expected).pc(Self::PC + 4),
        );
    }

    pub(super) fn test_rand_r<F>(&mut self, opcode: u8, funct3: u8, funct7: u8, calc: F)
    where
        F: FnOnce(WordType, WordType) -> WordType,
    {
        let (lhs, rhs) = (self.rand_word(), self.rand_word());
        self.test_rand_r_with(opcode, funct3, funct7, lhs, rhs, calc(lhs, rhs));
    }

    /// `calc` receives the sign-extended immediate.
    pub(super) fn test_rand_i<F>(&mut self, opcode: u8, funct3: u8, calc: F)
    where
        F: FnOnce(WordType, WordType) -> WordType,
    {
        let lhs = self.rand_word();
        let imm = self.rand_imm12();
        let rd = self.rand_reg_idx();
        let rs1 = self.rand_reg_idx();
        let raw = encode::i(opcode, funct3, rd, rs1, imm);
        let expected = calc(lhs, sign_extend(imm, 12));

        run_test_exec_decode(
            raw,
            |builder| builder.reg(rs1, lhs).pc(Self::PC),
            |checker| checker.reg(rd, expected).pc(Self::PC + 4),
        );
    }
}

/// Instruction word builders. Immediates are taken as raw bits and truncated to the field width.
pub(super) mod encode {
    fn regs(rd: u8, rs1: u8, rs2: u8) -> u32 {
        ((rd as u32 & 0x1f) << 7) | ((rs1 as u32 & 0x1f) << 15) | ((rs2 as u32 & 0x1f) << 20)
    }

    pub(in crate::isa::riscv) fn r(
        opcode: u8,
        funct3: u8,
        funct7: u8,
        rd: u8,
        rs1: u8,
        rs2: u8,
    ) -> u32 {
        ((funct7 as u32) << 25)
            | ((funct3 as u32 & 0b111) << 12)
            | regs(rd, rs1, rs2)
            | opcode as u32
    }

    pub(in crate::isa::riscv) fn i(opcode: u8, funct3: u8, rd: u8, rs1: u8, imm: u32) -> u32 {
        ((imm & 0xfff) << 20) | ((funct3 as u32 & 0b111) << 12) | regs(rd, rs1, 0) | opcode as u32
    }

    pub(in crate::isa::riscv) fn s(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: u32) -> u32 {
        (((imm >> 5) & 0x7f) << 25)
            | ((imm & 0x1f) << 7)
            | ((funct3 as u32 & 0b111) << 12)
            | regs(0, rs1, rs2)
            | opcode as u32
    }

    /// `imm` is the byte offset; bit 0 is dropped.
    pub(in crate::isa::riscv) fn b(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: u32) -> u32 {
        (((imm >> 12) & 1) << 31)
            | (((imm >> 5) & 0x3f) << 25)
            | (((imm >> 1) & 0xf) << 8)
            | (((imm >> 11) & 1) << 7)
            | ((funct3 as u32 & 0b111) << 12)
            | regs(0, rs1, rs2)
            | opcode as u32
    }

    /// `imm` is the final value of `rd`; the low 12 bits are dropped.
    pub(in crate::isa::riscv) fn u(opcode: u8, rd: u8, imm: u32) -> u32 {
        (imm & 0xffff_f000) | regs(rd, 0, 0) | opcode as u32
    }

    /// `imm` is the byte offset; bit 0 is dropped.
    pub(in crate::isa::riscv) fn j(opcode: u8, rd: u8, imm: u32) -> u32 {
        (((imm >> 20) & 1) << 31)
            | (((imm >> 1) & 0x3ff) << 21)
            | (((imm >> 11) & 1) << 20)
            | (((imm >> 12) & 0xff) << 12)
            | regs(rd, 0, 0)
            | opcode as u32
    }

    mod tests {
        use super::*;

        #[test]
        fn test_known_encodings() {
            assert_eq!(r(0x33, 0b000, 0b0100000, 6, 4, 5), 0x40520333); // sub x6, x4, x5
            assert_eq!(i(0x13, 0b000, 6, 5, 0xffd), 0xFFD28313); // addi x6, x5, -3
            assert_eq!(s(0x23, 0b010, 1, 5, 0), 0x0050A023); // sw x5, 0(x1)
            assert_eq!(b(0x63, 0b000, 1, 2, 8), 0x00208463); // beq x1, x2, 8
            assert_eq!(u(0x37, 5, 0x12345000), 0x123452B7); // lui x5, 0x12345
            assert_eq!(j(0x6f, 1, (-4i32) as u32), 0xFFDFF0EF); // jal ra, -4
        }
    }
}
