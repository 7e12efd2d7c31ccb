use crate::isa::riscv::{
    csr_reg::{
        CsrDesc,
        behavior::{Counter, CounterKind},
        csr_index,
    },
    instruction::InstructionSet,
};

#[rustfmt::skip]
const ZICNTR_CSRS: &[CsrDesc] = &[
    CsrDesc::new(csr_index::cycle, "cycle", 0, &Counter { kind: CounterKind::Cycle, high: false }),
    CsrDesc::new(csr_index::instret, "instret", 0, &Counter { kind: CounterKind::Instret, high: false }),
    CsrDesc::new(csr_index::cycleh, "cycleh", 0, &Counter { kind: CounterKind::Cycle, high: true }),
    CsrDesc::new(csr_index::instreth, "instreth", 0, &Counter { kind: CounterKind::Instret, high: true }),
];

/// User-level read-only views of the cycle and retired-instruction counters.
pub static ZICNTR: InstructionSet = InstructionSet {
    name: "Zicntr",
    extensions: "",
    instructions: &[],
    csrs: ZICNTR_CSRS,
};
