use smallvec::SmallVec;

use crate::isa::utils::DecodeMask;

/// Exact-match encodings, bucketed by opcode. The first matching mask wins.
pub(super) struct MaskDecoder {
    masks: Vec<SmallVec<[(DecodeMask, usize); 4]>>,
}

impl MaskDecoder {
    pub(super) fn new() -> Self {
        Self {
            masks: vec![SmallVec::new(); 1 << 7],
        }
    }

    /// Returns the arena index already holding an identical mask, leaving the table unchanged.
    pub(super) fn insert(&mut self, mask: DecodeMask, idx: usize) -> Option<usize> {
        let bucket = &mut self.masks[(mask.key & 0b1111111) as usize];
        if let Some((_, existing)) = bucket.iter().find(|(m, _)| *m == mask) {
            return Some(*existing);
        }
        bucket.push((mask, idx));
        None
    }

    pub(super) fn decode(&self, raw_instr: u32) -> Option<usize> {
        self.masks[(raw_instr & 0b1111111) as usize]
            .iter()
            .find(|(mask, _)| mask.matches(raw_instr))
            .map(|(_, idx)| *idx)
    }
}
