use std::{fmt::Debug, ops::Index};

use crate::config::arch_config::{REG_NAME, REGFILE_CNT, WordType};

/// Integer register file. `x0` is hard-wired to zero: there is no mutable indexing, only
/// [`RegFile::write`], which drops writes to index 0.
#[derive(Clone, PartialEq, Eq)]
pub struct RegFile {
    data: [WordType; REGFILE_CNT],
}

impl Index<usize> for RegFile {
    type Output = WordType;

    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl Debug for RegFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex_width = size_of::<WordType>() * 2;

        writeln!(f, "reg_file {{")?;
        for (i, val) in self.data.iter().enumerate() {
            if i % 8 == 0 {
                write!(f, "  ")?;
            }

            write!(
                f,
                "{:>6}: 0x{:0width$x}  ",
                REG_NAME[i],
                val,
                width = hex_width
            )?;

            if i % 8 == 7 {
                writeln!(f)?;
            }
        }

        write!(f, "}}")
    }
}

impl Default for RegFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegFile {
    pub fn new() -> Self {
        Self {
            data: [0; REGFILE_CNT],
        }
    }

    pub fn read(&self, id1: u8, id2: u8) -> (WordType, WordType) {
        (self.data[id1 as usize], self.data[id2 as usize])
    }

    /// id == 0 will be ignored, if an instruction do not need to WriteBack, set id = 0.
    pub fn write(&mut self, id: u8, data: WordType) {
        if id == 0u8 {
            return;
        }

        self.data[id as usize] = data
    }

    pub fn as_array(&self) -> &[WordType; REGFILE_CNT] {
        &self.data
    }
}
