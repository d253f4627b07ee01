//! Top-level machine assembly
//!
//! Owns the devices, wires the bus, and drives time: the PPU is clocked
//! once per master clock and the CPU once every third, preserving the
//! 3:1 video-to-processor ratio.

use crate::bus::{Bus, BusError};
use crate::cpu::{Cpu, DisassembledLine};
use crate::loader::{self, LoaderError};
use crate::memory::Memory;
use crate::ppu::{Frame, Mirroring, Ppu};
use std::cell::{Ref, RefCell};
use std::path::Path;
use std::rc::Rc;

/// A fully wired machine: RAM window at slots 0-1, PPU registers at
/// slots 2-3, program ROM at slots 8-15.
pub struct Nes {
    cpu: Cpu,
    bus: Rc<Bus>,
    memory: Rc<RefCell<Memory>>,
    ppu: Rc<RefCell<Ppu>>,
    clock_counter: u64,
}

impl Nes {
    /// Assemble the machine with the given nametable arrangement.
    /// The fixed memory map cannot conflict, but registration errors are
    /// surfaced rather than swallowed.
    pub fn new(mirroring: Mirroring) -> Result<Self, BusError> {
        let memory = Rc::new(RefCell::new(Memory::banked()));
        let ppu = Rc::new(RefCell::new(Ppu::new(mirroring)));

        let mut bus = Bus::new();
        bus.register_device(memory.clone(), 0x0000, 2)?;
        bus.register_device(ppu.clone(), 0x2000, 2)?;
        bus.register_device(memory.clone(), 0x8000, 8)?;
        let bus = Rc::new(bus);

        Ok(Self {
            cpu: Cpu::new(bus.clone()),
            bus,
            memory,
            ppu,
            clock_counter: 0,
        })
    }

    /// Load an in-memory iNES image into the machine's backing stores
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), LoaderError> {
        loader::load(
            bytes,
            &mut self.memory.borrow_mut(),
            &mut self.ppu.borrow_mut(),
        )
    }

    /// Load an iNES file from disk
    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoaderError> {
        loader::load_file(
            path,
            &mut self.memory.borrow_mut(),
            &mut self.ppu.borrow_mut(),
        )
    }

    /// Reset the processor (re-reads the reset vector) and the PPU
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.ppu.borrow_mut().reset();
        self.clock_counter = 0;
    }

    /// Advance one master clock: the PPU ticks every call, the CPU every
    /// third. Returns true when the PPU completed a frame.
    pub fn clock(&mut self) -> bool {
        let frame_done = self.ppu.borrow_mut().clock();
        if self.clock_counter % 3 == 0 {
            self.cpu.clock();
        }
        self.clock_counter += 1;
        frame_done
    }

    /// Clock until the PPU reports a completed frame
    pub fn run_frame(&mut self) {
        while !self.clock() {}
    }

    /// Clock until the CPU reaches its next instruction boundary,
    /// keeping the 3:1 PPU ratio.
    pub fn step_cpu(&mut self) {
        loop {
            let _ = self.ppu.borrow_mut().clock();
            let boundary = if self.clock_counter % 3 == 0 {
                self.cpu.clock()
            } else {
                false
            };
            self.clock_counter += 1;
            if boundary {
                break;
            }
        }
    }

    /// Raise the maskable interrupt line
    pub fn irq(&mut self) {
        self.cpu.irq();
    }

    /// Raise the non-maskable interrupt line
    pub fn nmi(&mut self) {
        self.cpu.nmi();
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn ppu(&self) -> Ref<'_, Ppu> {
        self.ppu.borrow()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The most recently completed frame
    pub fn screen(&self) -> Frame {
        self.ppu.borrow().screen().clone()
    }

    /// Disassemble around an arbitrary address (see [`Cpu::disassemble`])
    pub fn disassemble(&self, start: u16, count: usize, max_bytes: usize) -> Vec<DisassembledLine> {
        self.cpu.disassemble(start, count, max_bytes)
    }
}
