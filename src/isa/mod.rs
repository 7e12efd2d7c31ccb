pub mod riscv;

mod utils;

pub use utils::{DecodeMask, create_decode_mask};
