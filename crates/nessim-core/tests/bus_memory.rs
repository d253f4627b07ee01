//! Bus registration and memory translation through the shared bus.

use nessim_core::bus::{Bus, BusError};
use nessim_core::device::BusDevice;
use nessim_core::memory::Memory;
use std::cell::RefCell;
use std::rc::Rc;

fn shared(memory: Memory) -> Rc<RefCell<Memory>> {
    Rc::new(RefCell::new(memory))
}

#[test]
fn test_register_upper_half() {
    let memory = shared(Memory::flat(0x8000));
    let mut bus = Bus::new();
    bus.register_device(memory.clone(), 0x8000, 8).unwrap();

    memory.borrow_mut().write(0x0123, 0xAB);
    assert_eq!(bus.read(0x8123), 0xAB);

    bus.write(0x9000, 0x42);
    assert_eq!(memory.borrow().read(0x1000), 0x42);
}

#[test]
fn test_overlapping_registration_rejected() {
    let first = shared(Memory::flat(0x4000));
    let second = shared(Memory::flat(0x4000));
    let mut bus = Bus::new();
    bus.register_device(first.clone(), 0x2000, 4).unwrap();

    // The second device wants slots 3..7; slot 3 is taken.
    let err = bus
        .register_device(second, 0x3000, 4)
        .expect_err("overlap must be rejected");
    assert_eq!(err, BusError::SlotOccupied(3));

    // And the failure must not have claimed slots 4..6 either
    first.borrow_mut().write(0x0000, 0x5A);
    assert_eq!(bus.read(0x2000), 0x5A);
    assert_eq!(bus.read(0x6000), 0, "slots past the conflict stay free");
}

#[test]
fn test_registration_range_validation() {
    let memory = shared(Memory::flat(0x1000));
    let mut bus = Bus::new();
    assert_eq!(
        bus.register_device(memory.clone(), 0x1000, 0),
        Err(BusError::InvalidBlockCount(0))
    );
    assert_eq!(
        bus.register_device(memory.clone(), 0x1000, 17),
        Err(BusError::InvalidBlockCount(17))
    );
    // 0xF000 + 2 blocks runs off the end of the address space
    assert_eq!(
        bus.register_device(memory, 0xF000, 2),
        Err(BusError::RangeOutOfBounds)
    );
}

#[test]
fn test_unmapped_access_is_inert() {
    let bus = Bus::new();
    assert_eq!(bus.read(0x1234), 0);
    bus.write(0x1234, 0xFF);
    assert_eq!(bus.read(0x1234), 0);
}

#[test]
fn test_read_word_is_little_endian() {
    let memory = shared(Memory::flat(0x1000));
    let mut bus = Bus::new();
    bus.register_device(memory.clone(), 0x0000, 1).unwrap();
    memory.borrow_mut().write(0x0010, 0xCD);
    memory.borrow_mut().write(0x0011, 0xAB);
    assert_eq!(bus.read_word(0x0010), 0xABCD);
}

#[test]
fn test_banked_ram_mirrors_every_2k() {
    let memory = shared(Memory::banked());
    let mut bus = Bus::new();
    bus.register_device(memory, 0x0000, 2).unwrap();

    bus.write(0x0000, 0x11);
    assert_eq!(bus.read(0x0800), 0x11);
    assert_eq!(bus.read(0x1000), 0x11);
    assert_eq!(bus.read(0x1800), 0x11);

    // Writes through a mirror land in the same cell
    bus.write(0x1FFF, 0x22);
    assert_eq!(bus.read(0x07FF), 0x22);
}

#[test]
fn test_single_bank_rom_mirrors_high_window() {
    let memory = shared(Memory::banked());
    memory.borrow_mut().rom_bank_mut(false)[0x0123] = 0x99;
    assert!(memory.borrow().high_bank_mirrored());

    let mut bus = Bus::new();
    bus.register_device(memory.clone(), 0x8000, 8).unwrap();

    assert_eq!(bus.read(0x8123), 0x99);
    assert_eq!(bus.read(0xC123), 0x99, "high window aliases the low bank");

    // Allocating the high bank ends the mirroring
    memory.borrow_mut().rom_bank_mut(true)[0x0123] = 0x44;
    assert!(!memory.borrow().high_bank_mirrored());
    assert_eq!(bus.read(0x8123), 0x99);
    assert_eq!(bus.read(0xC123), 0x44);
}

#[test]
fn test_rom_window_ignores_bus_writes() {
    let memory = shared(Memory::banked());
    memory.borrow_mut().rom_bank_mut(false)[0] = 0x60;

    let mut bus = Bus::new();
    bus.register_device(memory, 0x8000, 8).unwrap();

    bus.write(0x8000, 0x00);
    assert_eq!(bus.read(0x8000), 0x60);
}
