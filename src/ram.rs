use crate::{
    config::arch_config::WordType,
    device::{Bus, BusError},
    ram_config,
};

/// Flat little-endian RAM mapped at `base`.
pub struct Ram {
    base: WordType,
    data: Box<[u8]>,
}

impl Default for Ram {
    fn default() -> Self {
        Self::new(ram_config::BASE_ADDR, ram_config::SIZE)
    }
}

impl Ram {
    pub fn new(base: WordType, size: usize) -> Self {
        Self {
            base,
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn base(&self) -> WordType {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy `section` into RAM starting at physical address `start_addr`.
    pub fn insert_section(&mut self, section: &[u8], start_addr: WordType) -> Result<(), BusError> {
        let offset = self.offset_of(start_addr, section.len()).map_err(|err| {
            log::error!(
                "ram::insert_section out of range! start_addr = {:#x}, len = {}",
                start_addr,
                section.len()
            );
            err
        })?;
        self.data[offset..offset + section.len()].copy_from_slice(section);
        Ok(())
    }

    fn offset_of(&self, addr: WordType, size: usize) -> Result<usize, BusError> {
        let err = BusError::OutOfRange {
            addr,
            size: size.min(u8::MAX as usize) as u8,
        };
        let offset = addr.checked_sub(self.base).ok_or(err)? as usize;
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(offset),
            _ => Err(err),
        }
    }

    fn slice<const N: usize>(&self, addr: WordType) -> Result<[u8; N], BusError> {
        let offset = self.offset_of(addr, N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[offset..offset + N]);
        Ok(bytes)
    }

    fn store(&mut self, addr: WordType, bytes: &[u8]) -> Result<(), BusError> {
        let offset = self.offset_of(addr, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl Bus for Ram {
    fn read8(&mut self, addr: WordType) -> Result<u8, BusError> {
        Ok(self.slice::<1>(addr)?[0])
    }

    fn read16(&mut self, addr: WordType) -> Result<u16, BusError> {
        self.slice(addr).map(u16::from_le_bytes)
    }

    fn read32(&mut self, addr: WordType) -> Result<u32, BusError> {
        self.slice(addr).map(u32::from_le_bytes)
    }

    fn write8(&mut self, addr: WordType, data: u8) -> Result<(), BusError> {
        self.store(addr, &[data])
    }

    fn write16(&mut self, addr: WordType, data: u16) -> Result<(), BusError> {
        self.store(addr, &data.to_le_bytes())
    }

    fn write32(&mut self, addr: WordType, data: u32) -> Result<(), BusError> {
        self.store(addr, &data.to_le_bytes())
    }
}
