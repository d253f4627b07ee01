//! NES simulator CLI - headless frame runner

use clap::Parser;
use nessim_core::ppu::Mirroring;
use nessim_core::system::Nes;
use std::path::PathBuf;

/// NES simulator CLI
#[derive(Parser, Debug)]
#[command(name = "nessim-cli")]
#[command(about = "A headless NES simulator", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Nametable mirroring arrangement
    #[arg(short, long, default_value = "vertical")]
    mirroring: String,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump PPU state after execution
    #[arg(short = 'p', long)]
    dump_ppu: bool,

    /// Disassemble this many instructions from the reset target
    #[arg(short = 'd', long, default_value = "0")]
    disassemble: usize,
}

fn main() {
    let args = Args::parse();

    let mirroring = match args.mirroring.as_str() {
        "vertical" => Mirroring::Vertical,
        "horizontal" => Mirroring::Horizontal,
        "single" => Mirroring::SingleScreen,
        "four" => Mirroring::FourScreen,
        other => {
            eprintln!("Unknown mirroring mode: {}", other);
            std::process::exit(1);
        }
    };

    let mut nes = match Nes::new(mirroring) {
        Ok(nes) => nes,
        Err(e) => {
            eprintln!("Failed to assemble machine: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = nes.load_rom_file(&args.rom) {
        eprintln!("Failed to load ROM: {}", e);
        std::process::exit(1);
    }
    nes.reset();

    println!("Loaded {}", args.rom.display());
    println!("Reset target: ${:04X}", nes.cpu().pc());

    if args.disassemble > 0 {
        println!("\nDisassembly:");
        let limit = args.disassemble * 3;
        for line in nes.disassemble(nes.cpu().pc(), args.disassemble, limit) {
            println!("  ${:04X}  {}", line.address, line.text);
        }
    }

    println!("\nRunning {} frames...", args.frames);
    for _ in 0..args.frames {
        nes.run_frame();
    }
    println!("Completed {} frames.", args.frames);

    if args.dump_cpu {
        dump_cpu_state(&nes);
    }

    if args.dump_ppu {
        dump_ppu_state(&nes);
    }
}

fn dump_cpu_state(nes: &Nes) {
    let cpu = nes.cpu();

    println!("\nCPU State:");
    println!("  A:    ${:02X}", cpu.a());
    println!("  X:    ${:02X}", cpu.x());
    println!("  Y:    ${:02X}", cpu.y());
    println!("  PC:   ${:04X}", cpu.pc());
    println!("  SP:   ${:02X}", cpu.sp());
    println!("  P:    {}", cpu.status());
}

fn dump_ppu_state(nes: &Nes) {
    let ppu = nes.ppu();

    println!("\nPPU State:");
    println!("  Scanline: {}", ppu.scanline());
    println!("  Cycle: {}", ppu.cycle());
}
