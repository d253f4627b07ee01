//! Whole-system tests: an iNES image loaded into the assembled machine,
//! executed through the master clock.

use nessim_core::loader::LoaderError;
use nessim_core::ppu::Mirroring;
use nessim_core::system::Nes;

/// Build an in-memory iNES image. PRG banks are 16KB, CHR banks 8KB;
/// `program` lands at the start of the first PRG bank and the reset
/// vector points at 0x8000.
fn image(program: &[u8], prg_banks: u8, chr: &[u8], trainer: bool) -> Vec<u8> {
    let mut bytes = vec![0u8; 16];
    bytes[0..4].copy_from_slice(b"NES\x1A");
    bytes[4] = prg_banks;
    bytes[5] = if chr.is_empty() { 0 } else { 1 };
    bytes[6] = if trainer { 0x08 } else { 0x00 };

    if trainer {
        bytes.extend(std::iter::repeat(0xEE).take(512));
    }

    let mut prg = vec![0u8; prg_banks as usize * 16 * 1024];
    prg[..program.len()].copy_from_slice(program);
    // Reset vector sits at the top of the last bank
    let top = prg.len();
    prg[top - 4] = 0x00;
    prg[top - 3] = 0x80;
    bytes.extend_from_slice(&prg);

    if !chr.is_empty() {
        let mut bank = vec![0u8; 8 * 1024];
        bank[..chr.len()].copy_from_slice(chr);
        bytes.extend_from_slice(&bank);
    }
    bytes
}

#[test]
fn test_load_store_roundtrip_through_the_machine() {
    // LDA #$10; STA $00; LDA $00
    let rom = image(&[0xA9, 0x10, 0x85, 0x00, 0xA5, 0x00], 1, &[], false);

    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    nes.reset();
    assert_eq!(nes.cpu().pc(), 0x8000);

    nes.step_cpu();
    assert_eq!(nes.cpu().a(), 0x10);
    nes.step_cpu();
    assert_eq!(nes.bus().read(0x0000), 0x10);
    nes.step_cpu();
    assert_eq!(nes.cpu().a(), 0x10);
}

#[test]
fn test_single_bank_program_mirrors_to_vectors() {
    // With one PRG bank the 0xC000 window aliases 0x8000, so the vector
    // written at the top of the bank is readable at 0xFFFC.
    let rom = image(&[0xEA], 1, &[], false);
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();

    assert_eq!(nes.bus().read(0xFFFC), 0x00);
    assert_eq!(nes.bus().read(0xFFFD), 0x80);
    assert_eq!(nes.bus().read(0x8000), nes.bus().read(0xC000));
}

#[test]
fn test_two_bank_program_fills_both_windows() {
    let mut program = vec![0u8; 16 * 1024 + 4];
    program[0] = 0xA9; // LDA #$55 at 0x8000
    program[1] = 0x55;
    program[16 * 1024] = 0xA9; // LDA #$AA at 0xC000
    program[16 * 1024 + 1] = 0xAA;
    let rom = image(&program, 2, &[], false);

    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    assert_eq!(nes.bus().read(0x8000), 0xA9);
    assert_eq!(nes.bus().read(0x8001), 0x55);
    assert_eq!(nes.bus().read(0xC000), 0xA9);
    assert_eq!(nes.bus().read(0xC001), 0xAA);
}

#[test]
fn test_trainer_is_skipped() {
    let rom = image(&[0xA9, 0x42], 1, &[], true);
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    nes.reset();
    nes.step_cpu();
    assert_eq!(nes.cpu().a(), 0x42);
}

#[test]
fn test_chr_lands_in_video_memory() {
    let mut chr = vec![0u8; 32];
    chr[0] = 0xDE;
    chr[16] = 0xAD;
    let rom = image(&[0xEA], 1, &chr, false);

    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    assert_eq!(nes.ppu().video_read(0x0000), 0xDE);
    assert_eq!(nes.ppu().video_read(0x0010), 0xAD);
}

#[test]
fn test_bad_magic_rejected() {
    let mut rom = image(&[0xEA], 1, &[], false);
    rom[3] = 0x00;
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    match nes.load_rom(&rom) {
        Err(LoaderError::InvalidImage(_)) => {}
        other => panic!("expected InvalidImage, got {:?}", other),
    }
}

#[test]
fn test_truncated_image_rejected() {
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    match nes.load_rom(b"NES\x1A") {
        Err(LoaderError::InvalidImage(_)) => {}
        other => panic!("expected InvalidImage, got {:?}", other),
    }
}

#[test]
fn test_master_clock_divides_by_three() {
    // JMP $8000 spins forever: 3 CPU cycles per lap, 9 master clocks
    let rom = image(&[0x4C, 0x00, 0x80], 1, &[], false);
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    nes.reset();

    for lap in 1..=4 {
        nes.step_cpu();
        assert_eq!(nes.cpu().pc(), 0x8000, "lap {}", lap);
    }
}

#[test]
fn test_run_frame_completes_exactly_one_frame() {
    let rom = image(&[0x4C, 0x00, 0x80], 1, &[], false);
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    nes.reset();

    assert_eq!(nes.ppu().scanline(), -1);
    nes.run_frame();
    assert_eq!(nes.ppu().scanline(), -1);
    assert_eq!(nes.ppu().cycle(), 0);
}

#[test]
fn test_nmi_reaches_the_cpu() {
    // Handler at 0x8010: LDA #$77; loop
    let mut program = vec![0u8; 32];
    program[0] = 0x4C; // JMP $8000
    program[1] = 0x00;
    program[2] = 0x80;
    program[0x10] = 0xA9;
    program[0x11] = 0x77;
    let mut rom = image(&program, 1, &[], false);
    // NMI vector at 0xFFFA within the mirrored bank
    let top = rom.len();
    rom[top - 6] = 0x10;
    rom[top - 5] = 0x80;

    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    nes.reset();
    nes.step_cpu();

    nes.nmi();
    nes.step_cpu(); // interrupt acknowledge
    assert_eq!(nes.cpu().pc(), 0x8010);
    nes.step_cpu();
    assert_eq!(nes.cpu().a(), 0x77);
}

#[test]
fn test_cpu_writes_reach_ppu_registers() {
    let rom = image(&[0xA9, 0x90, 0x8D, 0x00, 0x20], 1, &[], false);
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    nes.reset();
    nes.step_cpu();
    nes.step_cpu();
    assert_eq!(nes.bus().read(0x2000), 0x90);
}

#[test]
fn test_disassemble_through_the_system() {
    let rom = image(&[0xA9, 0x10, 0x8D, 0xCD, 0xAB], 1, &[], false);
    let mut nes = Nes::new(Mirroring::Vertical).unwrap();
    nes.load_rom(&rom).unwrap();
    let lines = nes.disassemble(0x8000, 2, 16);
    assert_eq!(lines[0].text, "LDA #$10");
    assert_eq!(lines[1].text, "STA $ABCD");
}
