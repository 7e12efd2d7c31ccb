use crate::config::arch_config::REGFILE_CNT;

/// Single-precision register storage. Values are kept as raw bit patterns so NaN payloads survive
/// a round trip.
#[derive(Clone, PartialEq, Eq)]
pub struct FloatRegFile {
    data: [u32; REGFILE_CNT],
}

impl Default for FloatRegFile {
    fn default() -> Self {
        Self::new()
    }
}

impl FloatRegFile {
    pub fn new() -> Self {
        FloatRegFile {
            data: [0; REGFILE_CNT],
        }
    }

    pub fn read_float(&self, id1: u8, id2: u8) -> (f32, f32) {
        let float1 = f32::from_bits(self.data[id1 as usize]);
        let float2 = f32::from_bits(self.data[id2 as usize]);
        (float1, float2)
    }

    pub fn write_float(&mut self, id: u8, value: f32) {
        self.data[id as usize] = value.to_bits();
    }

    pub fn read_bits(&self, id: u8) -> u32 {
        self.data[id as usize]
    }

    pub fn write_bits(&mut self, id: u8, bits: u32) {
        self.data[id as usize] = bits;
    }
}
