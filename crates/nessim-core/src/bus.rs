//! Address bus and slot-based decoding
//!
//! The 64KB address space is divided into 16 fixed 4KB slots; the high
//! nibble of an address selects the slot. A device may occupy several
//! contiguous slots but each slot is bound at most once. This is the only
//! form of address decoding — there is no overlap or priority resolution,
//! so startup wiring must avoid conflicting ranges.

use crate::device::SharedDevice;
use std::fmt;

/// Number of 4KB slots covering the 64KB address space
pub const SLOT_COUNT: usize = 16;

/// Errors raised by device registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Block count outside 1..=16
    InvalidBlockCount(u8),
    /// Requested range runs past the end of the address space
    RangeOutOfBounds,
    /// A slot in the requested range already has a device
    SlotOccupied(usize),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::InvalidBlockCount(n) => write!(f, "Invalid block count: {}", n),
            BusError::RangeOutOfBounds => write!(f, "Address range exceeds 64KB space"),
            BusError::SlotOccupied(slot) => write!(f, "Slot {} already occupied", slot),
        }
    }
}

impl std::error::Error for BusError {}

/// The address-routing fabric connecting the CPU to its peripherals
pub struct Bus {
    slots: [Option<SharedDevice>; SLOT_COUNT],
}

impl Bus {
    /// Create a bus with all 16 slots empty
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    /// Map `blocks` contiguous 4KB slots starting at `start_address >> 12`
    /// to the given device.
    ///
    /// Fails without mutating any slot if the block count is outside
    /// 1..=16, the range runs past the 64KB space, or any target slot is
    /// already occupied.
    pub fn register_device(
        &mut self,
        device: SharedDevice,
        start_address: u16,
        blocks: u8,
    ) -> Result<(), BusError> {
        if blocks < 1 || blocks as usize > SLOT_COUNT {
            return Err(BusError::InvalidBlockCount(blocks));
        }

        let first = Self::slot_index(start_address);

        // Validate the whole range before assigning anything
        for i in 0..blocks as usize {
            let slot = first + i;
            if slot >= SLOT_COUNT {
                return Err(BusError::RangeOutOfBounds);
            }
            if self.slots[slot].is_some() {
                return Err(BusError::SlotOccupied(slot));
            }
        }

        for i in 0..blocks as usize {
            self.slots[first + i] = Some(device.clone());
        }
        Ok(())
    }

    /// Read a byte, returning 0 when no device occupies the slot
    pub fn read(&self, address: u16) -> u8 {
        match &self.slots[Self::slot_index(address)] {
            Some(device) => device.borrow().read(address),
            None => 0,
        }
    }

    /// Write a byte; silently dropped when no device occupies the slot
    pub fn write(&self, address: u16, data: u8) {
        if let Some(device) = &self.slots[Self::slot_index(address)] {
            device.borrow_mut().write(address, data);
        }
    }

    /// Read a little-endian 16-bit word
    pub fn read_word(&self, address: u16) -> u16 {
        let lo = self.read(address) as u16;
        let hi = self.read(address.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn slot_index(address: u16) -> usize {
        ((address >> 12) & 0xF) as usize
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
