use criterion::{criterion_group, criterion_main, Criterion};
use nessim_core::ppu::{Mirroring, Ppu};
use nessim_core::system::Nes;

fn image(program: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 16];
    bytes[0..4].copy_from_slice(b"NES\x1A");
    bytes[4] = 1;
    let mut prg = vec![0u8; 16 * 1024];
    prg[..program.len()].copy_from_slice(program);
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0x80;
    bytes.extend_from_slice(&prg);
    bytes
}

fn bench_cpu_step(c: &mut Criterion) {
    // JMP $8000 spins forever at 3 cycles per instruction
    let rom = image(&[0x4C, 0x00, 0x80]);
    let mut nes = Nes::new(Mirroring::Vertical).expect("wiring");
    nes.load_rom(&rom).expect("load");
    nes.reset();

    c.bench_function("cpu_step", |b| {
        b.iter(|| {
            nes.step_cpu();
            nes.cpu().pc()
        })
    });
}

fn bench_ppu_frame(c: &mut Criterion) {
    let mut ppu = Ppu::new(Mirroring::Vertical);

    c.bench_function("ppu_frame", |b| {
        b.iter(|| {
            while !ppu.clock() {}
            ppu.scanline()
        })
    });
}

fn bench_full_frame(c: &mut Criterion) {
    let rom = image(&[0x4C, 0x00, 0x80]);
    let mut nes = Nes::new(Mirroring::Vertical).expect("wiring");
    nes.load_rom(&rom).expect("load");
    nes.reset();

    c.bench_function("machine_frame", |b| {
        b.iter(|| {
            nes.run_frame();
            nes.ppu().cycle()
        })
    });
}

criterion_group!(benches, bench_cpu_step, bench_ppu_frame, bench_full_frame);
criterion_main!(benches);
