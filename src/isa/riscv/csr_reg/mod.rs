pub mod behavior;

use std::collections::HashMap;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    config::{ShadowPolicy, arch_config::WordType},
    isa::riscv::{
        csr_reg::behavior::{Csr, CounterKind},
        error::ConfigError,
        instruction::InstructionSet,
        trap::Exception,
    },
};

#[rustfmt::skip]
#[allow(non_upper_case_globals, unused)]
pub mod csr_index {
    use crate::config::arch_config::WordType;

    // User counters
    pub const cycle     : WordType  = 0xC00;
    pub const instret   : WordType  = 0xC02;
    pub const cycleh    : WordType  = 0xC80;
    pub const instreth  : WordType  = 0xC82;

    // Supervisor
    pub const sstatus   : WordType  = 0x100;
    pub const sie       : WordType  = 0x104;
    pub const stvec     : WordType  = 0x105;
    pub const scounteren: WordType  = 0x106;
    pub const sscratch  : WordType  = 0x140;
    pub const sepc      : WordType  = 0x141;
    pub const scause    : WordType  = 0x142;
    pub const stval     : WordType  = 0x143;
    pub const sip       : WordType  = 0x144;
    pub const satp      : WordType  = 0x180;    // Sv32 root page table and MODE

    // Machine
    pub const mstatus   : WordType  = 0x300;
    pub const misa      : WordType  = 0x301;
    pub const medeleg   : WordType  = 0x302;
    pub const mideleg   : WordType  = 0x303;
    pub const mie       : WordType  = 0x304;
    pub const mtvec     : WordType  = 0x305;
    pub const mcounteren: WordType  = 0x306;
    pub const mscratch  : WordType  = 0x340;
    pub const mepc      : WordType  = 0x341;
    pub const mcause    : WordType  = 0x342;
    pub const mtval     : WordType  = 0x343;
    pub const mip       : WordType  = 0x344;
    pub const mcycle    : WordType  = 0xB00;
    pub const minstret  : WordType  = 0xB02;
    pub const mcycleh   : WordType  = 0xB80;
    pub const minstreth : WordType  = 0xB82;
    pub const mvendorid : WordType  = 0xF11;
    pub const marchid   : WordType  = 0xF12;
    pub const mimpid    : WordType  = 0xF13;
    pub const mhartid   : WordType  = 0xF14;

    static BY_NAME: phf::Map<&'static str, WordType> = phf::phf_map! {
        "cycle" => cycle, "instret" => instret, "cycleh" => cycleh, "instreth" => instreth,
        "sstatus" => sstatus, "sie" => sie, "stvec" => stvec, "scounteren" => scounteren,
        "sscratch" => sscratch, "sepc" => sepc, "scause" => scause, "stval" => stval,
        "sip" => sip, "satp" => satp,
        "mstatus" => mstatus, "misa" => misa, "medeleg" => medeleg, "mideleg" => mideleg,
        "mie" => mie, "mtvec" => mtvec, "mcounteren" => mcounteren, "mscratch" => mscratch,
        "mepc" => mepc, "mcause" => mcause, "mtval" => mtval, "mip" => mip,
        "mcycle" => mcycle, "minstret" => minstret, "mcycleh" => mcycleh,
        "minstreth" => minstreth, "mvendorid" => mvendorid, "marchid" => marchid,
        "mimpid" => mimpid, "mhartid" => mhartid,
    };

    /// Look up a standard CSR address by its assembler name.
    pub fn by_name(name: &str) -> Option<WordType> {
        BY_NAME.get(name).copied()
    }
}

#[repr(u8)]
#[derive(
    Debug, PartialEq, PartialOrd, Ord, Eq, Clone, Copy, Hash, IntoPrimitive, TryFromPrimitive,
)]
pub enum PrivilegeLevel {
    U = 0,
    S = 1,
    M = 3,
}

impl PrivilegeLevel {
    /// Lowest mode allowed to touch `addr`, from address bits 9:8.
    pub fn from_csr_address(addr: WordType) -> PrivilegeLevel {
        match (addr >> 8) & 0b11 {
            0 => PrivilegeLevel::U,
            1 => PrivilegeLevel::S,
            // 0b10 is hypervisor space; without H it is machine-only.
            _ => PrivilegeLevel::M,
        }
    }
}

/// Addresses with bits 11:10 == 0b11 are read-only.
pub fn is_read_only(addr: WordType) -> bool {
    (addr >> 10) & 0b11 == 0b11
}

bitflags! {
    /// Fields of `mstatus` implemented for RV32 with S and U modes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: WordType {
        const SIE  = 1 << 1;
        const MIE  = 1 << 3;
        const SPIE = 1 << 5;
        const MPIE = 1 << 7;
        const SPP  = 1 << 8;
        const MPP  = 0b11 << 11;
        const MPRV = 1 << 17;
        const SUM  = 1 << 18;
        const MXR  = 1 << 19;
        const TVM  = 1 << 20;
        const TW   = 1 << 21;
        const TSR  = 1 << 22;
    }
}

impl StatusFlags {
    pub const MPP_SHIFT: u32 = 11;
}

/// Static description of a CSR contributed by an instruction set.
#[derive(Clone, Copy)]
pub struct CsrDesc {
    pub addr: WordType,
    pub name: &'static str,
    /// Minimum privilege. `None` derives it from the address.
    pub level: Option<PrivilegeLevel>,
    pub reset: WordType,
    pub behavior: &'static dyn Csr,
}

impl CsrDesc {
    pub const fn new(
        addr: WordType,
        name: &'static str,
        reset: WordType,
        behavior: &'static dyn Csr,
    ) -> Self {
        Self {
            addr,
            name,
            level: None,
            reset,
            behavior,
        }
    }

    pub const fn with_level(mut self, level: PrivilegeLevel) -> Self {
        self.level = Some(level);
        self
    }
}

impl std::fmt::Debug for CsrDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrDesc")
            .field("addr", &format_args!("{:#05x}", self.addr))
            .field("name", &self.name)
            .field("level", &self.level)
            .field("reset", &self.reset)
            .finish()
    }
}

/// Public summary of a registered CSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrInfo {
    pub addr: WordType,
    pub name: &'static str,
    pub level: PrivilegeLevel,
}

/// Backing values of every CSR plus the 64-bit counters.
#[derive(Debug, Default, Clone)]
pub struct CsrState {
    values: HashMap<WordType, WordType>,
    cycle: u64,
    instret: u64,
}

impl CsrState {
    pub fn get(&self, addr: WordType) -> WordType {
        self.values.get(&addr).copied().unwrap_or(0)
    }

    pub fn set(&mut self, addr: WordType, value: WordType) {
        self.values.insert(addr, value);
    }

    pub fn counter(&self, kind: CounterKind) -> u64 {
        match kind {
            CounterKind::Cycle => self.cycle,
            CounterKind::Instret => self.instret,
        }
    }

    pub fn set_counter(&mut self, kind: CounterKind, value: u64) {
        match kind {
            CounterKind::Cycle => self.cycle = value,
            CounterKind::Instret => self.instret = value,
        }
    }
}

#[derive(Clone, Copy)]
struct CsrEntry {
    name: &'static str,
    level: PrivilegeLevel,
    reset: WordType,
    behavior: &'static dyn Csr,
}

const DEFAULT_PRIVILEGE_LEVEL: PrivilegeLevel = PrivilegeLevel::M;

/// Sparse CSR bank. An address without an entry is always illegal.
pub struct CsrRegFile {
    entries: HashMap<WordType, CsrEntry>,
    state: CsrState,
    cpl: PrivilegeLevel, // current privileged level
}

impl Default for CsrRegFile {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrRegFile {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            state: CsrState::default(),
            cpl: DEFAULT_PRIVILEGE_LEVEL,
        }
    }

    pub fn from_sets(sets: &[&InstructionSet], policy: ShadowPolicy) -> Result<Self, ConfigError> {
        let mut csr = Self::new();
        for set in sets {
            for desc in set.csrs {
                csr.register(desc, policy)?;
            }
        }
        log::debug!("CSR bank has {} registers.", csr.entries.len());
        Ok(csr)
    }

    pub fn register(&mut self, desc: &CsrDesc, policy: ShadowPolicy) -> Result<(), ConfigError> {
        if desc.addr > 0xFFF {
            return Err(ConfigError::InvalidEncoding {
                name: desc.name,
                reason: "CSR address is wider than 12 bits",
            });
        }

        if let Some(existing) = self.entries.get(&desc.addr) {
            match policy {
                ShadowPolicy::Reject => {
                    return Err(ConfigError::DuplicateCsr {
                        addr: desc.addr,
                        name: desc.name,
                        existing: existing.name,
                    });
                }
                ShadowPolicy::Replace => log::warn!(
                    "CSR {:#05x}: `{}` replaces `{}`",
                    desc.addr,
                    desc.name,
                    existing.name
                ),
            }
        }

        self.entries.insert(
            desc.addr,
            CsrEntry {
                name: desc.name,
                level: desc
                    .level
                    .unwrap_or_else(|| PrivilegeLevel::from_csr_address(desc.addr)),
                reset: desc.reset,
                behavior: desc.behavior,
            },
        );
        self.state.set(desc.addr, desc.reset);
        Ok(())
    }

    /// Change the value `addr` takes on reset, and apply it now.
    pub fn set_reset_value(&mut self, addr: WordType, value: WordType) -> Option<()> {
        let entry = self.entries.get_mut(&addr)?;
        entry.reset = value;
        self.state.set(addr, value);
        Some(())
    }

    pub fn reset(&mut self) {
        self.state = CsrState::default();
        for (addr, entry) in self.entries.iter() {
            self.state.set(*addr, entry.reset);
        }
        self.cpl = DEFAULT_PRIVILEGE_LEVEL;
    }

    pub fn contains(&self, addr: WordType) -> bool {
        self.entries.contains_key(&addr)
    }

    pub fn info(&self, addr: WordType) -> Option<CsrInfo> {
        self.entries.get(&addr).map(|entry| CsrInfo {
            addr,
            name: entry.name,
            level: entry.level,
        })
    }

    /// All registered CSRs in address order.
    pub fn infos(&self) -> Vec<CsrInfo> {
        let mut infos: Vec<_> = self
            .entries
            .keys()
            .filter_map(|addr| self.info(*addr))
            .collect();
        infos.sort_by_key(|info| info.addr);
        infos
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        self.cpl
    }

    pub fn set_current_privileged(&mut self, level: PrivilegeLevel) {
        if self.cpl != level {
            log::debug!("Privilege level changed from {:?} to {:?}", self.cpl, level);
        }
        self.cpl = level;
    }

    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.state.get(csr_index::mstatus))
    }

    fn check_access(&self, addr: WordType, write: bool) -> Result<&'static dyn Csr, Exception> {
        let entry = self
            .entries
            .get(&addr)
            .ok_or(Exception::IllegalInstruction)?;

        if self.cpl < entry.level || (write && is_read_only(addr)) {
            return Err(Exception::IllegalInstruction);
        }

        if addr == csr_index::satp
            && self.cpl == PrivilegeLevel::S
            && self.status().contains(StatusFlags::TVM)
        {
            return Err(Exception::IllegalInstruction);
        }

        if matches!(addr, 0xC00..=0xC1F | 0xC80..=0xC9F) && !self.counter_enabled(addr) {
            return Err(Exception::IllegalInstruction);
        }

        Ok(entry.behavior)
    }

    /// `mcounteren`/`scounteren` gating of the user counters.
    fn counter_enabled(&self, addr: WordType) -> bool {
        let bit = 1 << (addr & 0x1F);
        let enabled_by = |level: PrivilegeLevel, enable_csr: WordType| {
            self.cpl >= level
                || !self.contains(enable_csr)
                || self.state.get(enable_csr) & bit != 0
        };
        enabled_by(PrivilegeLevel::M, csr_index::mcounteren)
            && enabled_by(PrivilegeLevel::S, csr_index::scounteren)
    }

    /// Read with privilege check.
    pub fn read(&self, addr: WordType) -> Result<WordType, Exception> {
        let behavior = self.check_access(addr, false)?;
        Ok(behavior.read(addr, &self.state))
    }

    /// Write with privilege check and the CSR's own legalization.
    pub fn write(&mut self, addr: WordType, data: WordType) -> Result<(), Exception> {
        let behavior = self.check_access(addr, true)?;
        behavior.write(addr, &mut self.state, data);
        Ok(())
    }

    /// Read without privilege check. `None` if the CSR was never registered.
    pub fn read_uncheck_privilege(&self, addr: WordType) -> Option<WordType> {
        let entry = self.entries.get(&addr)?;
        Some(entry.behavior.read(addr, &self.state))
    }

    /// Write without privilege check, but still through the CSR's behavior.
    /// If you want to write without any validation, use [`Self::write_directly`] instead.
    pub fn write_uncheck_privilege(&mut self, addr: WordType, data: WordType) -> Option<()> {
        let behavior = self.entries.get(&addr)?.behavior;
        behavior.write(addr, &mut self.state, data);
        Some(())
    }

    /// Stored value of `addr`, bypassing behavior. Unregistered addresses read as zero.
    pub fn read_directly(&self, addr: WordType) -> WordType {
        self.state.get(addr)
    }

    /// Write directly without any check or validation and have no other side effects.
    pub fn write_directly(&mut self, addr: WordType, data: WordType) -> Option<()> {
        if !self.contains(addr) {
            return None;
        }
        self.state.set(addr, data);
        Some(())
    }

    /// Advance `cycle`, and `instret` if an instruction retired.
    pub fn tick(&mut self, retired: bool) {
        self.state.cycle = self.state.cycle.wrapping_add(1);
        if retired {
            self.state.instret = self.state.instret.wrapping_add(1);
        }
    }
}
