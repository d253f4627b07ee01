//! Memory-mapped device capability
//!
//! Everything attached to the bus implements [`BusDevice`]: the bus hands
//! each access the full 16-bit address and the device applies its own
//! translation (mirroring, banking) before touching its backing store.

use std::cell::RefCell;
use std::rc::Rc;

/// 1KB block size
pub const SIZE_1K: usize = 0x0400;
/// 2KB block size
pub const SIZE_2K: usize = 0x0800;
/// 4KB block size (one bus slot)
pub const SIZE_4K: usize = 0x1000;
/// 8KB block size
pub const SIZE_8K: usize = 0x2000;
/// 16KB block size (one ROM bank)
pub const SIZE_16K: usize = 0x4000;

/// Contract implemented by every memory-mapped peripheral
pub trait BusDevice {
    /// Read a byte at the given bus address
    fn read(&self, address: u16) -> u8;
    /// Write a byte at the given bus address
    fn write(&mut self, address: u16, data: u8);
}

/// Shared handle to a bus device
///
/// Devices are constructed and owned by the top-level assembly and only
/// registered with the bus, so the bus holds shared handles rather than
/// owning its peripherals.
pub type SharedDevice = Rc<RefCell<dyn BusDevice>>;
