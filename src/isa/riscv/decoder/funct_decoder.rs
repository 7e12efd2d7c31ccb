use smallvec::SmallVec;

use crate::isa::riscv::{error::ConfigError, instruction::Instruction};

const MAP_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct SmallMap<K, V> {
    data: SmallVec<[(K, V); MAP_LENGTH]>,
}

impl<K: PartialEq + Copy, V> SmallMap<K, V> {
    pub fn new() -> Self {
        SmallMap {
            data: SmallVec::new(),
        }
    }

    /// Returns the previous value of `key`, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some((_, slot)) = self.data.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        self.data.push((key, value));
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.data.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, V)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
enum Funct3Slot {
    #[default]
    Empty,
    Complete(usize),
    ByFunct7(SmallMap<u8, usize>),
}

#[derive(Debug, Clone, Default)]
enum OpcodeSlot {
    #[default]
    Empty,
    /// U/J: the opcode alone names the instruction.
    Complete(usize),
    ByFunct3 {
        /// Any instruction living under this opcode, for diagnostics.
        first: usize,
        slots: Box<[Funct3Slot; 8]>,
    },
}

/// opcode -> funct3 -> funct7 lookup. Stores indices into the instruction arena.
pub(super) struct FunctDecoder {
    decode_table: Vec<OpcodeSlot>,
}

#[inline]
fn fields(raw: u32) -> (usize, usize, u8) {
    let opcode = (raw & 0b1111111) as usize;
    let funct3 = ((raw >> 12) & 0b111) as usize;
    let funct7 = (raw >> 25) as u8;
    (opcode, funct3, funct7)
}

/// `Err(existing)` when the slot is keyed differently than `funct7` asks for.
fn insert_funct3(
    slot: &mut Funct3Slot,
    funct7: Option<u8>,
    idx: usize,
) -> Result<Option<usize>, usize> {
    match slot {
        Funct3Slot::Empty => {
            *slot = match funct7 {
                None => Funct3Slot::Complete(idx),
                Some(funct7) => {
                    let mut map = SmallMap::new();
                    map.insert(funct7, idx);
                    Funct3Slot::ByFunct7(map)
                }
            };
            Ok(None)
        }
        Funct3Slot::Complete(existing) => match funct7 {
            None => Ok(Some(*existing)),
            Some(_) => Err(*existing),
        },
        Funct3Slot::ByFunct7(map) => {
            let Some(funct7) = funct7 else {
                return map.iter().next().map_or(Ok(None), |(_, existing)| Err(*existing));
            };
            if let Some(existing) = map.get(&funct7).copied() {
                return Ok(Some(existing));
            }
            map.insert(funct7, idx);
            Ok(None)
        }
    }
}

impl FunctDecoder {
    pub(super) fn new() -> Self {
        Self {
            decode_table: vec![OpcodeSlot::Empty; 1 << 7],
        }
    }

    /// Place `instr` at arena position `idx`.
    ///
    /// `Ok(Some(existing))` means the key is already taken and nothing changed; the caller
    /// decides whether the new instruction replaces the existing one in the arena.
    pub(super) fn insert(
        &mut self,
        instr: &Instruction,
        idx: usize,
        arena: &[Instruction],
    ) -> Result<Option<usize>, ConfigError> {
        let format_conflict = |existing: usize| ConfigError::FormatConflict {
            name: instr.name,
            format: instr.format,
            opcode: instr.opcode,
            existing: arena[existing].name,
            existing_format: arena[existing].format,
        };
        let ambiguous = |existing: usize| ConfigError::AmbiguousEncoding {
            name: instr.name,
            existing: arena[existing].name,
            key: instr.key(),
        };

        let slot = &mut self.decode_table[instr.opcode as usize];

        let Some(funct3) = instr.funct3 else {
            return match slot {
                OpcodeSlot::Empty => {
                    *slot = OpcodeSlot::Complete(idx);
                    Ok(None)
                }
                OpcodeSlot::Complete(existing) => Ok(Some(*existing)),
                OpcodeSlot::ByFunct3 { first, .. } => Err(format_conflict(*first)),
            };
        };

        match slot {
            OpcodeSlot::Complete(existing) => Err(format_conflict(*existing)),
            OpcodeSlot::Empty => {
                let mut slots: Box<[Funct3Slot; 8]> = Box::default();
                let result = insert_funct3(&mut slots[funct3 as usize], instr.funct7, idx);
                *slot = OpcodeSlot::ByFunct3 { first: idx, slots };
                result.map_err(ambiguous)
            }
            OpcodeSlot::ByFunct3 { slots, .. } => {
                insert_funct3(&mut slots[funct3 as usize], instr.funct7, idx).map_err(ambiguous)
            }
        }
    }

    pub(super) fn decode(&self, raw: u32) -> Option<usize> {
        let (opcode, funct3, funct7) = fields(raw);

        match &self.decode_table[opcode] {
            OpcodeSlot::Empty => None,
            OpcodeSlot::Complete(idx) => Some(*idx),
            OpcodeSlot::ByFunct3 { slots, .. } => match &slots[funct3] {
                Funct3Slot::Empty => None,
                Funct3Slot::Complete(idx) => Some(*idx),
                Funct3Slot::ByFunct7(map) => map.get(&funct7).copied(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_map() {
        let mut map = SmallMap::new();
        assert!(map.is_empty());
        assert_eq!(map.insert(0x20u8, 1usize), None);
        assert_eq!(map.insert(0x00, 2), None);
        assert_eq!(map.insert(0x20, 3), Some(1));
        assert_eq!(map.get(&0x20), Some(&3));
        assert_eq!(map.get(&0x01), None);
        assert_eq!(map.len(), 2);
    }
}
