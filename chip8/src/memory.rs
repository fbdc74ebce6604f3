//! Main memory.
use std::ops::Range;

use crate::{
    constants::*,
    error::{ExecutionFault, LoadError},
    font::FONTSET,
};

/// Flat addressable RAM, with the font resident in the reserved low region.
///
/// Every access is bounds checked. Multi-byte accesses check the whole range
/// up front, so a failed access never leaves a partial write behind.
///
/// The reserved region below [`MEM_START`] is read-only to everything but
/// font installation.
#[derive(Clone)]
pub struct Memory {
    ram: Box<[u8; MEM_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        let mut memory = Self {
            ram: Box::new([0; MEM_SIZE]),
        };
        memory.install_font();
        memory
    }
}

impl Memory {
    pub fn new() -> Self {
        Default::default()
    }

    /// Write the built-in font into the reserved low region.
    pub(crate) fn install_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    /// Copy a program into memory at [`MEM_START`].
    ///
    /// The rest of the program region is zeroed so nothing of a previously
    /// loaded program remains. The reserved low region is left alone.
    pub(crate) fn load_program(&mut self, program: &[u8]) -> Result<(), LoadError> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(LoadError::TooLarge {
                len: program.len(),
                capacity: MAX_PROGRAM_SIZE,
            });
        }

        self.restore_program(program);

        Ok(())
    }

    /// Rewrite the program region from a program that already passed
    /// [`Memory::load_program`]. Anything past the region is dropped.
    pub(crate) fn restore_program(&mut self, program: &[u8]) {
        let len = program.len().min(MAX_PROGRAM_SIZE);
        self.ram[MEM_START..].fill(0);
        self.ram[MEM_START..MEM_START + len].copy_from_slice(&program[..len]);
    }

    #[inline]
    pub fn read_byte(&self, addr: usize) -> Result<u8, ExecutionFault> {
        self.ram
            .get(addr)
            .copied()
            .ok_or(ExecutionFault::OutOfBounds { addr })
    }

    #[inline]
    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), ExecutionFault> {
        let range = Self::checked_write_range(addr, 1)?;
        self.ram[range.start] = value;
        Ok(())
    }

    /// Read a big-endian 16-bit word, as instructions are stored.
    #[inline]
    pub fn read_word(&self, addr: usize) -> Result<u16, ExecutionFault> {
        let bytes = self.slice(addr, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Borrow `len` bytes starting at `addr`.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], ExecutionFault> {
        let range = Self::checked_range(addr, len)?;
        Ok(&self.ram[range])
    }

    /// Mutably borrow `len` bytes starting at `addr`.
    ///
    /// Fails when the range touches the reserved region.
    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8], ExecutionFault> {
        let range = Self::checked_write_range(addr, len)?;
        Ok(&mut self.ram[range])
    }

    /// Entire address space.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.ram[..]
    }

    fn checked_range(addr: usize, len: usize) -> Result<Range<usize>, ExecutionFault> {
        match addr.checked_add(len) {
            Some(end) if end <= MEM_SIZE => Ok(addr..end),
            // Report the first address that falls outside.
            _ => Err(ExecutionFault::OutOfBounds {
                addr: addr.max(MEM_SIZE),
            }),
        }
    }

    fn checked_write_range(addr: usize, len: usize) -> Result<Range<usize>, ExecutionFault> {
        if addr < MEM_START && len > 0 {
            // Font and interpreter area.
            return Err(ExecutionFault::OutOfBounds { addr });
        }
        Self::checked_range(addr, len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_font_resident() {
        let memory = Memory::new();
        assert_eq!(memory.slice(FONTSET_START as usize, 5).unwrap(), &FONTSET[0..5]);
    }

    #[test]
    fn test_bounds() {
        let mut memory = Memory::new();

        assert!(memory.read_byte(MEM_SIZE - 1).is_ok());
        assert_eq!(
            memory.read_byte(MEM_SIZE),
            Err(ExecutionFault::OutOfBounds { addr: MEM_SIZE })
        );
        assert_eq!(
            memory.write_byte(0x1234, 1),
            Err(ExecutionFault::OutOfBounds { addr: 0x1234 })
        );

        // Word straddling the end of memory.
        assert_eq!(
            memory.read_word(MEM_SIZE - 1),
            Err(ExecutionFault::OutOfBounds { addr: MEM_SIZE })
        );
        assert!(memory.slice(MEM_SIZE - 3, 3).is_ok());
        assert!(memory.slice_mut(MEM_SIZE - 3, 4).is_err());
        assert!(memory.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_reserved_region_read_only() {
        let mut memory = Memory::new();

        assert_eq!(
            memory.write_byte(0, 0xFF),
            Err(ExecutionFault::OutOfBounds { addr: 0 })
        );
        assert_eq!(
            memory.slice_mut(MEM_START - 2, 3),
            Err(ExecutionFault::OutOfBounds {
                addr: MEM_START - 2
            })
        );
        assert_eq!(memory.slice(0, FONTSET_DATA_LENGTH).unwrap(), &FONTSET[..]);
        assert_eq!(memory.read_byte(MEM_START - 2), Ok(0));

        assert!(memory.write_byte(MEM_START, 1).is_ok());
        assert!(memory.slice_mut(MEM_START, 3).is_ok());
        // Reading the font is fine.
        assert!(memory.slice(FONTSET_START as usize, 5).is_ok());
    }

    #[test]
    fn test_read_word_big_endian() {
        let mut memory = Memory::new();
        memory.write_byte(0x300, 0xA2).unwrap();
        memory.write_byte(0x301, 0x1E).unwrap();
        assert_eq!(memory.read_word(0x300), Ok(0xA21E));
    }

    #[test]
    fn test_load_program_size() {
        let mut memory = Memory::new();

        assert!(memory.load_program(&vec![0xAA; MAX_PROGRAM_SIZE]).is_ok());
        assert_eq!(memory.read_byte(MEM_SIZE - 1), Ok(0xAA));

        assert_eq!(
            memory.load_program(&vec![0xBB; MAX_PROGRAM_SIZE + 1]),
            Err(LoadError::TooLarge {
                len: MAX_PROGRAM_SIZE + 1,
                capacity: MAX_PROGRAM_SIZE,
            })
        );
        // Failed load leaves memory untouched.
        assert_eq!(memory.read_byte(MEM_START), Ok(0xAA));
    }

    #[test]
    fn test_load_program_clears_previous() {
        let mut memory = Memory::new();
        memory.load_program(&[1, 2, 3, 4]).unwrap();
        memory.load_program(&[9]).unwrap();

        assert_eq!(memory.slice(MEM_START, 4).unwrap(), &[9, 0, 0, 0]);
        // Font is kept.
        assert_eq!(memory.slice(0, FONTSET_DATA_LENGTH).unwrap(), &FONTSET[..]);
    }
}
