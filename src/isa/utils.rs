#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeMask {
    pub key: u32,
    pub mask: u32,
}

impl DecodeMask {
    pub const fn matches(&self, instr: u32) -> bool {
        (instr & self.mask) == self.key
    }
}

/// Build a mask from a bit pattern such as `"0000000 00001 00000 000 00000 1110011"`.
/// `?` marks a don't-care bit, any other character is ignored.
pub const fn create_decode_mask(pattern: &'static str) -> DecodeMask {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    let mut len = 0;
    let mut key = 0u32;
    let mut mask = 0u32;

    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'0' || ch == b'1' || ch == b'?' {
            len += 1;

            key = (key << 1) | (ch == b'1') as u32;
            mask = (mask << 1) | (ch != b'?') as u32;
        }
        i += 1;
    }

    assert!(len == 32, "Pattern must describe exactly 32 bits");

    DecodeMask { key, mask }
}
