//! iNES image loading
//!
//! Parses the 16-byte cartridge header and copies program data into the
//! memory device's ROM bank buffers and character data into the PPU's
//! pattern-table buffer. A failed load leaves the core well-defined but
//! under-initialized.

use crate::device::{SIZE_16K, SIZE_8K};
use crate::memory::Memory;
use crate::ppu::Ppu;
use std::fmt;
use std::path::Path;

/// iNES header size in bytes
pub const HEADER_SIZE: usize = 16;
/// Trainer block size, skipped when present
const TRAINER_SIZE: usize = 512;

/// Errors raised while loading a cartridge image
#[derive(Debug)]
pub enum LoaderError {
    /// Header missing, wrong magic, or inconsistent sizes
    InvalidImage(&'static str),
    /// File could not be read
    Io(std::io::Error),
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::InvalidImage(reason) => write!(f, "Invalid iNES image: {}", reason),
            LoaderError::Io(err) => write!(f, "Failed to read image: {}", err),
        }
    }
}

impl std::error::Error for LoaderError {}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Io(err)
    }
}

/// Parsed iNES header fields consumed by the loader
#[derive(Debug, Clone, Copy)]
pub struct InesHeader {
    /// Program ROM size in 16KB units (1 = mirrored, 2 = 32KB)
    pub prg_banks: u8,
    /// Character ROM size in 8KB units (0 = none)
    pub chr_banks: u8,
    /// Flags byte 6; bit 3 marks a trainer block
    pub flags_6: u8,
}

impl InesHeader {
    /// Parse and validate the 16-byte header
    pub fn parse(bytes: &[u8]) -> Result<Self, LoaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(LoaderError::InvalidImage("header too short"));
        }
        if bytes[0..4] != [b'N', b'E', b'S', 0x1A] {
            return Err(LoaderError::InvalidImage("bad magic"));
        }
        Ok(Self {
            prg_banks: bytes[4],
            chr_banks: bytes[5],
            flags_6: bytes[6],
        })
    }

    /// Whether a 512-byte trainer block precedes the program data
    pub fn has_trainer(&self) -> bool {
        self.flags_6 & 0x08 != 0
    }
}

/// Load an in-memory iNES image into the memory device and PPU.
///
/// The first 16KB of program data fills the low ROM bank; a second 16KB
/// fills the high bank (allocated on demand) when the header declares two
/// banks, otherwise the high bank keeps mirroring the low one. Character
/// data, when present, is copied into the PPU's pattern-table buffer.
pub fn load(bytes: &[u8], memory: &mut Memory, ppu: &mut Ppu) -> Result<(), LoaderError> {
    let header = InesHeader::parse(bytes)?;
    let mut offset = HEADER_SIZE;
    if header.has_trainer() {
        offset += TRAINER_SIZE;
    }

    if header.prg_banks == 0 {
        return Err(LoaderError::InvalidImage("no program banks"));
    }

    let low = bytes
        .get(offset..offset + SIZE_16K)
        .ok_or(LoaderError::InvalidImage("truncated program data"))?;
    memory.rom_bank_mut(false).copy_from_slice(low);
    offset += SIZE_16K;

    if header.prg_banks >= 2 {
        let high = bytes
            .get(offset..offset + SIZE_16K)
            .ok_or(LoaderError::InvalidImage("truncated program data"))?;
        memory.rom_bank_mut(true).copy_from_slice(high);
        offset += SIZE_16K;
    }

    if header.chr_banks > 0 {
        let chr_len = (header.chr_banks as usize * SIZE_8K).min(ppu.chr_mut().len());
        let chr = bytes
            .get(offset..offset + chr_len)
            .ok_or(LoaderError::InvalidImage("truncated character data"))?;
        ppu.chr_mut()[..chr_len].copy_from_slice(chr);
    }

    Ok(())
}

/// Read an iNES file from disk and load it
pub fn load_file<P: AsRef<Path>>(
    path: P,
    memory: &mut Memory,
    ppu: &mut Ppu,
) -> Result<(), LoaderError> {
    let bytes = std::fs::read(path)?;
    load(&bytes, memory, ppu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::Mirroring;

    fn image(prg_banks: u8, chr_banks: u8, flags_6: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"NES\x1A");
        bytes[4] = prg_banks;
        bytes[5] = chr_banks;
        bytes[6] = flags_6;
        if flags_6 & 0x08 != 0 {
            bytes.extend_from_slice(&[0xEE; TRAINER_SIZE]);
        }
        bytes.extend(std::iter::repeat(0x11).take(prg_banks as usize * SIZE_16K));
        bytes.extend(std::iter::repeat(0x22).take(chr_banks as usize * SIZE_8K));
        bytes
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = image(1, 0, 0);
        bytes[0] = b'X';
        let mut memory = Memory::banked();
        let mut ppu = Ppu::new(Mirroring::Vertical);
        assert!(load(&bytes, &mut memory, &mut ppu).is_err());
    }

    #[test]
    fn test_single_bank_stays_mirrored() {
        let bytes = image(1, 0, 0);
        let mut memory = Memory::banked();
        let mut ppu = Ppu::new(Mirroring::Vertical);
        load(&bytes, &mut memory, &mut ppu).unwrap();
        assert!(memory.high_bank_mirrored());
    }

    #[test]
    fn test_trainer_skipped() {
        let bytes = image(1, 1, 0x08);
        let mut memory = Memory::banked();
        let mut ppu = Ppu::new(Mirroring::Vertical);
        load(&bytes, &mut memory, &mut ppu).unwrap();
        // Program data, not trainer filler, landed in the ROM bank
        assert_eq!(memory.rom_bank_mut(false)[0], 0x11);
        assert_eq!(ppu.chr_mut()[0], 0x22);
    }

    #[test]
    fn test_two_banks_allocate_high() {
        let bytes = image(2, 0, 0);
        let mut memory = Memory::banked();
        let mut ppu = Ppu::new(Mirroring::Vertical);
        load(&bytes, &mut memory, &mut ppu).unwrap();
        assert!(!memory.high_bank_mirrored());
    }
}
