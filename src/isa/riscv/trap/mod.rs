use std::fmt::Display;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::config::arch_config::{WordType, XLEN};

pub mod trap_controller;

/// Trap cause together with the value destined for `xtval`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    Interrupt(Interrupt, WordType),
    Exception(Exception, WordType),
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Interrupt {
    SupervisorSoft = 1,
    MachineSoft = 3,
    SupervisorTimer = 5,
    MachineTimer = 7,
    SupervisorExternal = 9,
    MachineExternal = 11,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Exception {
    InstructionMisaligned = 0,
    InstructionFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadMisaligned = 4,
    LoadFault = 5,
    StoreMisaligned = 6,
    StoreFault = 7,
    UserEnvCall = 8,
    SupervisorEnvCall = 9,
    MachineEnvCall = 11,
    InstructionPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
}

impl Interrupt {
    /// Highest priority first.
    pub const PRIORITY: [Interrupt; 6] = [
        Interrupt::MachineExternal,
        Interrupt::MachineSoft,
        Interrupt::MachineTimer,
        Interrupt::SupervisorExternal,
        Interrupt::SupervisorSoft,
        Interrupt::SupervisorTimer,
    ];

    /// The bit of this interrupt in `mip`/`mie`/`mideleg`.
    pub fn mask(self) -> WordType {
        1 << u32::from(self)
    }
}

impl Exception {
    pub fn with_tval(self, tval: WordType) -> Trap {
        Trap::Exception(self, tval)
    }
}

impl From<Exception> for Trap {
    fn from(exception: Exception) -> Self {
        Trap::Exception(exception, 0)
    }
}

impl Trap {
    /// Value written to `xcause`. Interrupts carry the top bit.
    pub fn cause(&self) -> WordType {
        match *self {
            Trap::Interrupt(nr, _) => u32::from(nr) | (1 << (XLEN - 1)),
            Trap::Exception(nr, _) => nr.into(),
        }
    }

    /// Cause code without the interrupt bit.
    pub fn code(&self) -> WordType {
        match *self {
            Trap::Interrupt(nr, _) => nr.into(),
            Trap::Exception(nr, _) => nr.into(),
        }
    }

    pub fn tval(&self) -> WordType {
        match *self {
            Trap::Interrupt(_, tval) | Trap::Exception(_, tval) => tval,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Trap::Interrupt(..))
    }

    /// Recover a trap from the raw `xcause`/`xtval` pair, e.g. for diagnostics.
    pub fn from_cause(cause: WordType, tval: WordType) -> Option<Trap> {
        let code = cause & !(1 << (XLEN - 1));
        if cause >> (XLEN - 1) == 1 {
            Interrupt::try_from(code)
                .ok()
                .map(|nr| Trap::Interrupt(nr, tval))
        } else {
            Exception::try_from(code)
                .ok()
                .map(|nr| Trap::Exception(nr, tval))
        }
    }
}

impl Display for Trap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trap::Interrupt(nr, _) => write!(f, "interrupt {:?} (cause {:#x})", nr, self.cause()),
            Trap::Exception(nr, tval) => write!(
                f,
                "exception {:?} (cause {:#x}, tval {:#010x})",
                nr,
                self.cause(),
                tval
            ),
        }
    }
}
