//! RAM/ROM storage device
//!
//! Two configurations:
//! - flat: a plain store sized to its bus window, used for simple rigs
//! - banked: the cartridge-side layout — internal RAM below the ROM
//!   region, plus one or two 16KB program ROM banks
//!
//! Address-to-storage translation is a pure function of the address and
//! the configuration fixed at construction; the only post-construction
//! change is the on-demand allocation of the second ROM bank for 32KB
//! images.

use crate::device::{BusDevice, SIZE_16K, SIZE_2K};

/// Storage layout selected at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Flat,
    Banked,
}

/// Where a banked address lands after translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Ram(usize),
    RomLow(usize),
    RomHigh(usize),
}

/// A RAM/ROM device attachable to the bus
pub struct Memory {
    layout: Layout,
    /// Internal RAM; 2KB in the banked layout, the whole store when flat
    ram: Vec<u8>,
    /// Low 16KB program ROM bank (banked layout only)
    rom_low: Vec<u8>,
    /// High 16KB bank; `None` means it mirrors the low bank
    rom_high: Option<Vec<u8>>,
}

impl Memory {
    /// Create a flat store covering `size` bytes
    pub fn flat(size: usize) -> Self {
        Self {
            layout: Layout::Flat,
            ram: vec![0; size],
            rom_low: Vec::new(),
            rom_high: None,
        }
    }

    /// Create the banked cartridge layout: 2KB internal RAM mirrored
    /// across its 8KB window plus a 16KB ROM bank mirrored into the high
    /// bank until a second bank is requested.
    pub fn banked() -> Self {
        Self {
            layout: Layout::Banked,
            ram: vec![0; SIZE_2K],
            rom_low: vec![0; SIZE_16K],
            rom_high: None,
        }
    }

    /// Raw buffer accessor for the loader's bulk copies.
    ///
    /// Requesting the high bank allocates an independent second 16KB
    /// buffer the first time; until then high-bank reads alias the low
    /// bank. Only meaningful for the banked layout — a flat device hands
    /// out its whole store.
    pub fn rom_bank_mut(&mut self, high: bool) -> &mut [u8] {
        if self.layout == Layout::Flat {
            return &mut self.ram;
        }
        if high {
            self.rom_high.get_or_insert_with(|| vec![0; SIZE_16K])
        } else {
            &mut self.rom_low
        }
    }

    /// Whether the high ROM bank currently mirrors the low bank
    pub fn high_bank_mirrored(&self) -> bool {
        self.rom_high.is_none()
    }

    /// Banked translation: any of the top 3 address bits selects ROM,
    /// otherwise the 2KB RAM mirrored across its 8KB window; within ROM,
    /// bit 14 picks the low or high bank.
    fn translate(address: u16) -> Target {
        if address & 0xE000 == 0 {
            Target::Ram((address & 0x07FF) as usize)
        } else {
            let offset = (address & 0x3FFF) as usize;
            if address & 0x4000 != 0 {
                Target::RomHigh(offset)
            } else {
                Target::RomLow(offset)
            }
        }
    }
}

impl BusDevice for Memory {
    fn read(&self, address: u16) -> u8 {
        match self.layout {
            Layout::Flat => self.ram[address as usize % self.ram.len()],
            Layout::Banked => match Memory::translate(address) {
                Target::Ram(i) => self.ram[i],
                Target::RomLow(i) => self.rom_low[i],
                Target::RomHigh(i) => match &self.rom_high {
                    Some(bank) => bank[i],
                    None => self.rom_low[i],
                },
            },
        }
    }

    fn write(&mut self, address: u16, data: u8) {
        match self.layout {
            Layout::Flat => {
                let len = self.ram.len();
                self.ram[address as usize % len] = data;
            }
            Layout::Banked => match Memory::translate(address) {
                Target::Ram(i) => self.ram[i] = data,
                // ROM is not writable through the bus; the loader goes
                // through rom_bank_mut instead.
                Target::RomLow(_) | Target::RomHigh(_) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banked_translation() {
        assert_eq!(Memory::translate(0x0000), Target::Ram(0x0000));
        assert_eq!(Memory::translate(0x07FF), Target::Ram(0x07FF));
        // 2KB RAM mirrors across the 8KB window
        assert_eq!(Memory::translate(0x0800), Target::Ram(0x0000));
        assert_eq!(Memory::translate(0x1FFF), Target::Ram(0x07FF));
        assert_eq!(Memory::translate(0x8000), Target::RomLow(0x0000));
        assert_eq!(Memory::translate(0xBFFF), Target::RomLow(0x3FFF));
        assert_eq!(Memory::translate(0xC000), Target::RomHigh(0x0000));
        assert_eq!(Memory::translate(0xFFFF), Target::RomHigh(0x3FFF));
    }

    #[test]
    fn test_rom_write_dropped() {
        let mut mem = Memory::banked();
        mem.rom_bank_mut(false)[0] = 0xAA;
        mem.write(0x8000, 0x55);
        assert_eq!(mem.read(0x8000), 0xAA);
    }

    #[test]
    fn test_high_bank_allocation() {
        let mut mem = Memory::banked();
        assert!(mem.high_bank_mirrored());
        mem.rom_bank_mut(true)[0] = 0x12;
        assert!(!mem.high_bank_mirrored());
        assert_eq!(mem.read(0xC000), 0x12);
        assert_eq!(mem.read(0x8000), 0x00);
    }
}
