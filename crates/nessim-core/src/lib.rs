//! nessim-core - NES hardware simulation library
//!
//! Bit- and cycle-faithful emulation of the console's core silicon: the
//! 6502-family CPU, the slot-decoded address bus, the RAM/ROM device and
//! the picture-processing unit, plus the iNES loader that fills their
//! backing stores. Headless by design; a host drives the clock entry
//! points and reads the frame buffer and register accessors.

#![forbid(unsafe_code)]

/// Bus device capability and size constants
pub mod device;
/// Address bus and 4KB slot decoding
pub mod bus;
/// RAM/ROM storage device with banked translation
pub mod memory;
/// CPU (6502) core and disassembler
pub mod cpu;
/// Picture-processing unit
pub mod ppu;
/// iNES image loading
pub mod loader;
/// Top-level machine assembly
pub mod system;

pub use bus::{Bus, BusError};
pub use cpu::{AddrMode, Cpu, DisassembledLine, Instruction, OpCode, StatusFlags, OPCODES};
pub use device::{BusDevice, SharedDevice};
pub use loader::{InesHeader, LoaderError};
pub use memory::Memory;
pub use ppu::{Color, Frame, Mirroring, Ppu, NES_PALETTE};
pub use system::Nes;
