use thiserror::Error;

use crate::config::arch_config::WordType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("physical address {addr:#010x} (width {size}) is not backed by the bus")]
    OutOfRange { addr: WordType, size: u8 },
}

/// Physical memory seen by the core.
///
/// Multi-byte accesses are little-endian. The provided 16/32-bit methods compose the 8-bit
/// primitives; devices with a faster path should override them.
pub trait Bus {
    fn read8(&mut self, addr: WordType) -> Result<u8, BusError>;

    fn write8(&mut self, addr: WordType, data: u8) -> Result<(), BusError>;

    fn read16(&mut self, addr: WordType) -> Result<u16, BusError> {
        Ok(u16::from_le_bytes([
            self.read8(addr)?,
            self.read8(addr.wrapping_add(1))?,
        ]))
    }

    fn read32(&mut self, addr: WordType) -> Result<u32, BusError> {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.read8(addr.wrapping_add(i as WordType))?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn write16(&mut self, addr: WordType, data: u16) -> Result<(), BusError> {
        for (i, byte) in data.to_le_bytes().into_iter().enumerate() {
            self.write8(addr.wrapping_add(i as WordType), byte)?;
        }
        Ok(())
    }

    fn write32(&mut self, addr: WordType, data: u32) -> Result<(), BusError> {
        for (i, byte) in data.to_le_bytes().into_iter().enumerate() {
            self.write8(addr.wrapping_add(i as WordType), byte)?;
        }
        Ok(())
    }
}
