use std::fmt::Display;

use crate::{
    config::ShadowPolicy,
    isa::{
        DecodeMask,
        riscv::{
            error::ConfigError,
            instruction::{InstrFormat, Instruction, InstructionSet},
        },
    },
};

mod funct_decoder;
mod mask_decoder;

/// Encoding fields an instruction is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub opcode: u8,
    pub funct3: Option<u8>,
    pub funct7: Option<u8>,
    pub pattern: Option<DecodeMask>,
}

impl Display for DispatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(pattern) = self.pattern {
            return write!(f, "mask {:#010x}/{:#010x}", pattern.key, pattern.mask);
        }

        write!(f, "opcode {:#04x}", self.opcode)?;
        if let Some(funct3) = self.funct3 {
            write!(f, " funct3 {:#05b}", funct3)?;
        }
        if let Some(funct7) = self.funct7 {
            write!(f, " funct7 {:#09b}", funct7)?;
        }
        Ok(())
    }
}

/// Dispatch table assembled from instruction sets.
///
/// Instructions live in an arena; the mask and funct decoders only hold indices into it, so
/// replacing an instruction never touches the lookup structures.
pub struct InstructionTable {
    instrs: Vec<Instruction>,
    funct_decoder: funct_decoder::FunctDecoder,
    mask_decoder: mask_decoder::MaskDecoder,
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionTable {
    pub fn new() -> Self {
        Self {
            instrs: Vec::new(),
            funct_decoder: funct_decoder::FunctDecoder::new(),
            mask_decoder: mask_decoder::MaskDecoder::new(),
        }
    }

    pub fn from_sets(sets: &[&InstructionSet], policy: ShadowPolicy) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        for set in sets {
            for instr in set.instructions {
                table.insert(*instr, policy)?;
            }
        }
        log::debug!(
            "Instruction table has {} instructions from {} sets.",
            table.len(),
            sets.len()
        );
        Ok(table)
    }

    pub fn insert(&mut self, instr: Instruction, policy: ShadowPolicy) -> Result<(), ConfigError> {
        validate(&instr)?;

        let idx = self.instrs.len();
        let existing = match instr.pattern {
            Some(mask) => self.mask_decoder.insert(mask, idx),
            None => self.funct_decoder.insert(&instr, idx, &self.instrs)?,
        };

        let Some(existing) = existing else {
            self.instrs.push(instr);
            return Ok(());
        };

        match policy {
            ShadowPolicy::Reject => Err(ConfigError::DuplicateInstruction {
                name: instr.name,
                existing: self.instrs[existing].name,
                key: instr.key(),
            }),
            ShadowPolicy::Replace => {
                log::warn!(
                    "`{}` replaces `{}` at {}",
                    instr.name,
                    self.instrs[existing].name,
                    instr.key()
                );
                self.instrs[existing] = instr;
                Ok(())
            }
        }
    }

    /// Mask entries are consulted first, then opcode -> funct3 -> funct7.
    pub fn decode(&self, raw_instr: u32) -> Option<&Instruction> {
        self.mask_decoder
            .decode(raw_instr)
            .or_else(|| self.funct_decoder.decode(raw_instr))
            .map(|idx| &self.instrs[idx])
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instrs.iter()
    }
}

fn validate(instr: &Instruction) -> Result<(), ConfigError> {
    let invalid = |reason| {
        Err(ConfigError::InvalidEncoding {
            name: instr.name,
            reason,
        })
    };

    if instr.opcode > 0b1111111 || instr.opcode & 0b11 != 0b11 {
        return invalid("opcode is not a 7-bit opcode of a 32-bit instruction");
    }
    if instr.funct3.is_some_and(|funct3| funct3 > 0b111) {
        return invalid("funct3 is wider than 3 bits");
    }
    if instr.funct7.is_some_and(|funct7| funct7 > 0b1111111) {
        return invalid("funct7 is wider than 7 bits");
    }

    if let Some(mask) = instr.pattern {
        if mask.mask & 0b1111111 != 0b1111111 {
            return invalid("mask pattern does not fix the opcode");
        }
        if mask.key & !mask.mask != 0 {
            return invalid("mask key has bits outside the mask");
        }
        if instr.funct3.is_some() || instr.funct7.is_some() {
            return invalid("masked instruction also carries funct fields");
        }
        return Ok(());
    }

    match (instr.format, instr.funct3, instr.funct7) {
        (InstrFormat::R, Some(_), Some(_)) => Ok(()),
        (InstrFormat::R, _, _) => invalid("R-type needs funct3 and funct7"),
        (InstrFormat::I, Some(_), _) => Ok(()),
        (InstrFormat::S | InstrFormat::B, Some(_), None) => Ok(()),
        (InstrFormat::I | InstrFormat::S | InstrFormat::B, None, _) => {
            invalid("I/S/B-type needs funct3")
        }
        (InstrFormat::S | InstrFormat::B, Some(_), Some(_)) => {
            invalid("S/B-type has no funct7 field")
        }
        (InstrFormat::U | InstrFormat::J, None, None) => Ok(()),
        (InstrFormat::U | InstrFormat::J, _, _) => invalid("U/J-type has no funct fields"),
    }
}
