use crate::config::arch_config::{SignedWordType, WordType, XLEN};

pub fn sign_extend(value: WordType, from_bits: u32) -> WordType {
    let sign_bit = XLEN - from_bits;
    ((value << sign_bit) as SignedWordType >> sign_bit) as WordType
}

/// get the negative of given number of [`WordType`] in 2's complement.
pub fn negative_of(value: WordType) -> WordType {
    (!value).wrapping_add(1)
}

pub fn check_align(addr: WordType, size: u8) -> bool {
    addr & (size as WordType - 1) == 0
}

/// Extract `bits[hi:lo]` of `value`.
#[inline]
pub fn bit_range(value: u32, hi: u32, lo: u32) -> u32 {
    (value >> lo) & ((1u64 << (hi - lo + 1)) - 1) as u32
}
