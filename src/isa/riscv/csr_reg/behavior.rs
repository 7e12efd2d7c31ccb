//! Read/write behavior attached to every registered CSR.

use crate::{
    config::arch_config::WordType,
    isa::riscv::csr_reg::{CsrState, PrivilegeLevel, StatusFlags, csr_index},
};

/// Behavior of a CSR.
///
/// Implementations own no value: everything lives in [`CsrState`], so aliases like `sstatus`
/// can project another register's storage.
pub trait Csr: Sync {
    fn read(&self, addr: WordType, state: &CsrState) -> WordType;

    fn write(&self, addr: WordType, state: &mut CsrState, value: WordType);
}

/// Write `value` to the bits specified by `mask`.
#[inline]
fn masked_write(old_value: WordType, value: WordType, mask: WordType) -> WordType {
    (old_value & !mask) | (value & mask)
}

/// Plain storage where only `mask` bits are writable; the rest keep their reset value.
pub struct Warl {
    pub mask: WordType,
}

impl Warl {
    pub const ALL: Warl = Warl { mask: !0 };
}

impl Csr for Warl {
    fn read(&self, addr: WordType, state: &CsrState) -> WordType {
        state.get(addr)
    }

    fn write(&self, addr: WordType, state: &mut CsrState, value: WordType) {
        let new_value = masked_write(state.get(addr), value, self.mask);
        state.set(addr, new_value);
    }
}

/// Constant registers such as `mvendorid`. Writes are dropped.
pub struct ReadOnly;

impl Csr for ReadOnly {
    fn read(&self, addr: WordType, state: &CsrState) -> WordType {
        state.get(addr)
    }

    fn write(&self, _addr: WordType, _state: &mut CsrState, _value: WordType) {}
}

/// A restricted view of another CSR, e.g. `sstatus` over `mstatus`.
pub struct Shadow {
    pub target: WordType,
    pub read_mask: WordType,
    pub write_mask: WordType,
}

impl Csr for Shadow {
    fn read(&self, _addr: WordType, state: &CsrState) -> WordType {
        state.get(self.target) & self.read_mask
    }

    fn write(&self, _addr: WordType, state: &mut CsrState, value: WordType) {
        let new_value = masked_write(state.get(self.target), value, self.write_mask);
        state.set(self.target, new_value);
    }
}

/// `sie`/`sip` over `mie`/`mip`. Bits of interrupts not delegated in `mideleg` read as zero and
/// ignore writes.
pub struct DelegatedInterrupts {
    pub target: WordType,
    pub read_mask: WordType,
    pub write_mask: WordType,
}

impl Csr for DelegatedInterrupts {
    fn read(&self, _addr: WordType, state: &CsrState) -> WordType {
        state.get(self.target) & self.read_mask & state.get(csr_index::mideleg)
    }

    fn write(&self, _addr: WordType, state: &mut CsrState, value: WordType) {
        let mask = self.write_mask & state.get(csr_index::mideleg);
        let new_value = masked_write(state.get(self.target), value, mask);
        state.set(self.target, new_value);
    }
}

/// `mstatus`: WARL over the implemented fields, and `MPP` only accepts implemented modes.
pub struct Mstatus;

impl Mstatus {
    pub const WRITABLE: StatusFlags = StatusFlags::SIE
        .union(StatusFlags::MIE)
        .union(StatusFlags::SPIE)
        .union(StatusFlags::MPIE)
        .union(StatusFlags::SPP)
        .union(StatusFlags::MPP)
        .union(StatusFlags::MPRV)
        .union(StatusFlags::SUM)
        .union(StatusFlags::MXR)
        .union(StatusFlags::TVM)
        .union(StatusFlags::TW)
        .union(StatusFlags::TSR);
}

impl Csr for Mstatus {
    fn read(&self, addr: WordType, state: &CsrState) -> WordType {
        state.get(addr)
    }

    fn write(&self, addr: WordType, state: &mut CsrState, value: WordType) {
        let old_value = state.get(addr);
        let mut new_value = masked_write(old_value, value, Self::WRITABLE.bits());

        let mpp = StatusFlags::from_bits_retain(new_value).mpp();
        if mpp.is_none() {
            new_value = masked_write(new_value, old_value, StatusFlags::MPP.bits());
        }
        state.set(addr, new_value);
    }
}

/// `mtvec`/`stvec`: only direct (0) and vectored (1) modes exist.
pub struct Tvec;

impl Csr for Tvec {
    fn read(&self, addr: WordType, state: &CsrState) -> WordType {
        state.get(addr)
    }

    fn write(&self, addr: WordType, state: &mut CsrState, value: WordType) {
        let mode = match value & 0b11 {
            mode @ (0 | 1) => mode,
            _ => state.get(addr) & 0b11,
        };
        state.set(addr, (value & !0b11) | mode);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Cycle,
    Instret,
}

/// One half of a 64-bit hardware counter.
pub struct Counter {
    pub kind: CounterKind,
    pub high: bool,
}

impl Csr for Counter {
    fn read(&self, _addr: WordType, state: &CsrState) -> WordType {
        let value = state.counter(self.kind);
        if self.high {
            (value >> 32) as WordType
        } else {
            value as WordType
        }
    }

    fn write(&self, _addr: WordType, state: &mut CsrState, value: WordType) {
        let old_value = state.counter(self.kind);
        let new_value = if self.high {
            (old_value & 0xffff_ffff) | ((value as u64) << 32)
        } else {
            (old_value & !0xffff_ffff) | value as u64
        };
        state.set_counter(self.kind, new_value);
    }
}

impl StatusFlags {
    /// Decoded `MPP` field, `None` for the reserved encoding.
    pub fn mpp(self) -> Option<PrivilegeLevel> {
        let raw = (self.bits() & StatusFlags::MPP.bits()) >> StatusFlags::MPP_SHIFT;
        PrivilegeLevel::try_from(raw as u8).ok()
    }

    pub fn with_mpp(self, level: PrivilegeLevel) -> StatusFlags {
        let bits = (self.bits() & !StatusFlags::MPP.bits())
            | ((level as WordType) << StatusFlags::MPP_SHIFT);
        StatusFlags::from_bits_retain(bits)
    }

    pub fn spp(self) -> PrivilegeLevel {
        if self.contains(StatusFlags::SPP) {
            PrivilegeLevel::S
        } else {
            PrivilegeLevel::U
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warl_mask() {
        let mut state = CsrState::default();
        let csr = Warl { mask: 0xff };
        state.set(0x340, 0xaa00);
        csr.write(0x340, &mut state, 0x1234);
        assert_eq!(csr.read(0x340, &state), 0xaa34);
    }

    #[test]
    fn test_read_only() {
        let mut state = CsrState::default();
        state.set(0xf14, 3);
        ReadOnly.write(0xf14, &mut state, 9);
        assert_eq!(ReadOnly.read(0xf14, &state), 3);
    }

    #[test]
    fn test_shadow_projects_target() {
        let mut state = CsrState::default();
        let sie = Shadow {
            target: 0x304,
            read_mask: 0x222,
            write_mask: 0x222,
        };
        state.set(0x304, 0x888);
        sie.write(0x104, &mut state, 0xfff);
        assert_eq!(state.get(0x304), 0xaaa);
        assert_eq!(sie.read(0x104, &state), 0x222);
    }

    #[test]
    fn test_delegated_interrupts_follow_mideleg() {
        let mut state = CsrState::default();
        let sip = DelegatedInterrupts {
            target: csr_index::mip,
            read_mask: 0x222,
            write_mask: 0x2,
        };
        state.set(csr_index::mip, 0x20);
        assert_eq!(sip.read(csr_index::sip, &state), 0);
        sip.write(csr_index::sip, &mut state, 0x2);
        assert_eq!(state.get(csr_index::mip), 0x20);

        state.set(csr_index::mideleg, 0x22);
        assert_eq!(sip.read(csr_index::sip, &state), 0x20);
        sip.write(csr_index::sip, &mut state, 0x2);
        assert_eq!(state.get(csr_index::mip), 0x22);
    }

    #[test]
    fn test_mstatus_legalizes_mpp() {
        let mut state = CsrState::default();
        Mstatus.write(0x300, &mut state, StatusFlags::MPP.bits());
        assert_eq!(
            StatusFlags::from_bits_retain(state.get(0x300)).mpp(),
            Some(PrivilegeLevel::M)
        );

        // 0b10 is reserved, MPP keeps its previous value.
        Mstatus.write(0x300, &mut state, 0b10 << StatusFlags::MPP_SHIFT);
        assert_eq!(
            StatusFlags::from_bits_retain(state.get(0x300)).mpp(),
            Some(PrivilegeLevel::M)
        );

        // Unimplemented bits read as zero.
        Mstatus.write(0x300, &mut state, 0x8000_0000);
        assert_eq!(state.get(0x300), 0);
    }

    #[test]
    fn test_tvec_mode() {
        let mut state = CsrState::default();
        Tvec.write(0x305, &mut state, 0x8000_0001);
        assert_eq!(state.get(0x305), 0x8000_0001);
        Tvec.write(0x305, &mut state, 0x8000_0102);
        assert_eq!(state.get(0x305), 0x8000_0101);
    }

    #[test]
    fn test_counter_halves() {
        let mut state = CsrState::default();
        let low = Counter {
            kind: CounterKind::Cycle,
            high: false,
        };
        let high = Counter {
            kind: CounterKind::Cycle,
            high: true,
        };
        state.set_counter(CounterKind::Cycle, 0x1_ffff_ffff);
        assert_eq!(low.read(0xb00, &state), 0xffff_ffff);
        assert_eq!(high.read(0xb80, &state), 1);

        high.write(0xb80, &mut state, 5);
        assert_eq!(state.counter(CounterKind::Cycle), 0x5_ffff_ffff);
        low.write(0xb00, &mut state, 0);
        assert_eq!(state.counter(CounterKind::Cycle), 0x5_0000_0000);
        assert_eq!(state.counter(CounterKind::Instret), 0);
    }
}
