mod float_reg_file;
mod reg_file;

pub use float_reg_file::FloatRegFile;
pub use reg_file::RegFile;
