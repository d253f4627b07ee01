//! PPU (Picture Processing Unit)
//!
//! Two address spaces meet here: the bus-facing window, where the low 3
//! address bits select one of 8 registers mirrored across the whole
//! mapped range, and the internal 16KB video space holding the pattern
//! tables, the mirrored nametables and the aliased palette RAM. A
//! (cycle, scanline) counter pair drives frame generation into a
//! double-buffered raster image.

use crate::device::{BusDevice, SIZE_16K, SIZE_1K, SIZE_2K};

/// Control register index ($2000)
pub const PPUCTRL: usize = 0;
/// Mask register index ($2001)
pub const PPUMASK: usize = 1;
/// Status register index ($2002)
pub const PPUSTATUS: usize = 2;
/// OAM address register index ($2003)
pub const OAMADDR: usize = 3;
/// OAM data register index ($2004)
pub const OAMDATA: usize = 4;
/// Scroll register index ($2005)
pub const PPUSCROLL: usize = 5;
/// Video address register index ($2006)
pub const PPUADDR: usize = 6;
/// Video data register index ($2007)
pub const PPUDATA: usize = 7;

/// Cycles per scanline (0..=340)
const CYCLES_PER_SCANLINE: u16 = 341;
/// Scanlines per frame (-1..=260)
const LAST_SCANLINE: i16 = 260;

/// Screen dimensions
pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

/// One displayable pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color { r, g, b }
}

/// A raster image with row-major pixel storage
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Color>,
}

impl Frame {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Color {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        self.pixels[y * self.width + x] = color;
    }

    /// Raw pixel slice for host-side blitting
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }
}

/// Nametable arrangement, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    /// Tables 0/2 and 1/3 alias each other
    Vertical,
    /// Tables 0/1 and 2/3 alias each other
    Horizontal,
    /// All four tables alias one 1KB page
    SingleScreen,
    /// Four independent tables (second 2KB allocation)
    FourScreen,
}

/// The fixed 64-entry hardware color table
#[rustfmt::skip]
pub const NES_PALETTE: [Color; 64] = [
    rgb(84, 84, 84),    rgb(0, 30, 116),    rgb(8, 16, 144),    rgb(48, 0, 136),
    rgb(68, 0, 100),    rgb(92, 0, 48),     rgb(84, 4, 0),      rgb(60, 24, 0),
    rgb(32, 42, 0),     rgb(8, 58, 0),      rgb(0, 64, 0),      rgb(0, 60, 0),
    rgb(0, 50, 60),     rgb(0, 0, 0),       rgb(0, 0, 0),       rgb(0, 0, 0),
    rgb(152, 150, 152), rgb(8, 76, 196),    rgb(48, 50, 236),   rgb(92, 30, 228),
    rgb(136, 20, 176),  rgb(160, 20, 100),  rgb(152, 34, 32),   rgb(120, 60, 0),
    rgb(84, 90, 0),     rgb(40, 114, 0),    rgb(8, 124, 0),     rgb(0, 118, 40),
    rgb(0, 102, 120),   rgb(0, 0, 0),       rgb(0, 0, 0),       rgb(0, 0, 0),
    rgb(236, 238, 236), rgb(76, 154, 236),  rgb(120, 124, 236), rgb(176, 98, 236),
    rgb(228, 84, 236),  rgb(236, 88, 180),  rgb(236, 106, 100), rgb(212, 136, 32),
    rgb(160, 170, 0),   rgb(116, 196, 0),   rgb(76, 208, 32),   rgb(56, 204, 108),
    rgb(56, 180, 204),  rgb(60, 60, 60),    rgb(0, 0, 0),       rgb(0, 0, 0),
    rgb(236, 238, 236), rgb(168, 204, 236), rgb(188, 188, 236), rgb(212, 178, 236),
    rgb(236, 174, 236), rgb(236, 174, 212), rgb(236, 180, 176), rgb(228, 196, 144),
    rgb(204, 210, 120), rgb(180, 222, 120), rgb(168, 226, 144), rgb(152, 226, 180),
    rgb(160, 214, 228), rgb(160, 162, 160), rgb(0, 0, 0),       rgb(0, 0, 0),
];

/// Palette RAM index map: the 32 visible entries resolve into a 28-byte
/// backing store so that entries 0x10/0x14/0x18/0x1C alias
/// 0x00/0x04/0x08/0x0C (and the per-palette backdrop bytes share storage
/// with their mirrors).
#[rustfmt::skip]
const PALETTE_MAP: [usize; 32] = [
    0x00, 0x01, 0x02, 0x03,
    0x19, 0x04, 0x05, 0x06,
    0x1A, 0x07, 0x08, 0x09,
    0x1B, 0x0A, 0x0B, 0x0C,
    0x00, 0x0D, 0x0E, 0x0F,
    0x19, 0x10, 0x11, 0x12,
    0x1A, 0x13, 0x14, 0x15,
    0x1B, 0x16, 0x17, 0x18,
];

/// Where an internal video address lands after translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoTarget {
    /// Offset into the 16KB CHR buffer (both pattern tables)
    Pattern(usize),
    /// Logical nametable index and offset within it
    Nametable(usize, usize),
    /// Index into the 28-byte palette backing store
    Palette(usize),
}

/// The picture-processing unit
pub struct Ppu {
    registers: [u8; 8],
    oam: [u8; 256],

    /// 16KB character memory; bit 12 of a pattern address selects the table
    chr: Vec<u8>,
    /// 2KB nametable RAM
    vram: Vec<u8>,
    /// Second 2KB, allocated only for four-screen mapping
    vram_ext: Option<Vec<u8>>,
    /// 28-byte palette backing store behind [`PALETTE_MAP`]
    palette: [u8; 28],

    mirroring: Mirroring,

    /// Double-buffered raster output; `back` indexes the buffer being drawn
    frames: [Frame; 2],
    back: usize,

    cycle: u16,
    scanline: i16,
}

impl Ppu {
    /// Create a PPU with the given nametable arrangement. Four-screen
    /// mapping allocates its second video RAM here; the arrangement never
    /// changes afterwards.
    pub fn new(mirroring: Mirroring) -> Self {
        let mut registers = [0u8; 8];
        registers[PPUSTATUS] = 0xA0;

        Self {
            registers,
            oam: [0; 256],
            chr: vec![0; SIZE_16K],
            vram: vec![0; SIZE_2K],
            vram_ext: match mirroring {
                Mirroring::FourScreen => Some(vec![0; SIZE_2K]),
                _ => None,
            },
            palette: [0; 28],
            mirroring,
            frames: [
                Frame::new(SCREEN_WIDTH, SCREEN_HEIGHT),
                Frame::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            ],
            back: 0,
            cycle: 0,
            scanline: -1,
        }
    }

    /// Restore the power-on register mask and rewind the timing counters.
    /// OAM address and the video address register are left unchanged, as
    /// on the hardware.
    pub fn reset(&mut self) {
        self.registers[PPUCTRL] = 0x00;
        self.registers[PPUMASK] = 0x00;
        self.registers[PPUSTATUS] &= 0x80;
        self.registers[PPUSCROLL] = 0x00;
        self.registers[PPUDATA] = 0x00;
        self.cycle = 0;
        self.scanline = -1;
    }

    /// Advance one PPU clock, painting one pixel of the back buffer when
    /// inside the visible region. Returns true exactly once per frame,
    /// when the counters wrap and the buffers flip.
    pub fn clock(&mut self) -> bool {
        if (0..SCREEN_HEIGHT as i16).contains(&self.scanline)
            && (self.cycle as usize) < SCREEN_WIDTH
        {
            let x = self.cycle as usize;
            let y = self.scanline as usize;
            let color = self.background_pixel(x, y);
            self.frames[self.back].set_pixel(x, y, color);
        }

        self.cycle += 1;
        if self.cycle == CYCLES_PER_SCANLINE {
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline > LAST_SCANLINE {
                self.scanline = -1;
                self.back ^= 1;
                return true;
            }
        }
        false
    }

    /// Current cycle within the scanline
    pub fn cycle(&self) -> u16 {
        self.cycle
    }

    /// Current scanline (-1 is the pre-render line)
    pub fn scanline(&self) -> i16 {
        self.scanline
    }

    /// The most recently completed frame
    pub fn screen(&self) -> &Frame {
        &self.frames[self.back ^ 1]
    }

    /// Raw CHR buffer accessor for the loader's bulk copy
    pub fn chr_mut(&mut self) -> &mut [u8] {
        &mut self.chr
    }

    /// Decode one 4KB pattern table (16x16 tiles of 8x8 pixels, two bit
    /// planes per tile) into a 128x128 image through the given palette.
    pub fn pattern_table(&self, palette: u8, left: bool) -> Frame {
        let mut image = Frame::new(128, 128);
        let base: u16 = if left { 0x0000 } else { 0x1000 };

        for tile_y in 0..16u16 {
            for tile_x in 0..16u16 {
                let tile = base + (tile_y * 16 + tile_x) * 16;
                for row in 0..8u16 {
                    let lo = self.video_read(tile + row);
                    let hi = self.video_read(tile + row + 8);
                    for col in 0..8u16 {
                        let bit = 7 - col;
                        let value = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
                        image.set_pixel(
                            (tile_x * 8 + col) as usize,
                            (tile_y * 8 + row) as usize,
                            self.palette_color(palette, value),
                        );
                    }
                }
            }
        }
        image
    }

    /// Map a (palette, pixel value) pair through palette RAM into the
    /// fixed hardware color table.
    pub fn palette_color(&self, palette: u8, index: u8) -> Color {
        let entry = self.video_read(0x3F00 + (palette as u16) * 4 + index as u16);
        NES_PALETTE[(entry & 0x3F) as usize]
    }

    /// Read a byte from the internal video address space
    pub fn video_read(&self, address: u16) -> u8 {
        match self.video_target(address) {
            VideoTarget::Pattern(i) => self.chr[i],
            VideoTarget::Nametable(table, offset) => {
                let (ext, base) = self.nametable_slot(table);
                if ext {
                    self.vram_ext.as_ref().map_or(0, |ram| ram[base + offset])
                } else {
                    self.vram[base + offset]
                }
            }
            VideoTarget::Palette(i) => self.palette[i],
        }
    }

    /// Write a byte into the internal video address space
    pub fn video_write(&mut self, address: u16, data: u8) {
        match self.video_target(address) {
            VideoTarget::Pattern(i) => self.chr[i] = data,
            VideoTarget::Nametable(table, offset) => {
                let (ext, base) = self.nametable_slot(table);
                if ext {
                    if let Some(ram) = self.vram_ext.as_mut() {
                        ram[base + offset] = data;
                    }
                } else {
                    self.vram[base + offset] = data;
                }
            }
            VideoTarget::Palette(i) => self.palette[i] = data,
        }
    }

    /// Pure address translation over the four 4KB video regions: pattern
    /// tables below 0x2000, nametables at 0x2000 (mirrored again at
    /// 0x3000), palette entries in the 0x3F00 window.
    fn video_target(&self, address: u16) -> VideoTarget {
        let address = address & 0x3FFF;
        match (address >> 12) & 0x3 {
            0 | 1 => VideoTarget::Pattern((address & 0x1FFF) as usize),
            2 => VideoTarget::Nametable(
                ((address >> 10) & 0x3) as usize,
                (address & 0x03FF) as usize,
            ),
            3 => {
                if address & 0x0100 != 0 {
                    VideoTarget::Palette(PALETTE_MAP[(address & 0x1F) as usize])
                } else {
                    VideoTarget::Nametable(
                        ((address >> 10) & 0x3) as usize,
                        (address & 0x03FF) as usize,
                    )
                }
            }
            _ => unreachable!("video region masked to 2 bits"),
        }
    }

    /// Resolve a logical nametable index to (extended-RAM?, base offset)
    /// under the construction-time mirroring arrangement.
    fn nametable_slot(&self, table: usize) -> (bool, usize) {
        match self.mirroring {
            Mirroring::Vertical => match table {
                0 | 2 => (false, 0),
                _ => (false, SIZE_1K),
            },
            Mirroring::Horizontal => match table {
                0 | 1 => (false, 0),
                _ => (false, SIZE_1K),
            },
            Mirroring::SingleScreen => (false, 0),
            Mirroring::FourScreen => match table {
                0 => (false, 0),
                1 => (false, SIZE_1K),
                2 => (true, 0),
                _ => (true, SIZE_1K),
            },
        }
    }

    /// Background composition for one screen pixel: tile index from the
    /// control-selected nametable, pattern planes from the
    /// control-selected pattern table, palette from the attribute table.
    fn background_pixel(&self, x: usize, y: usize) -> Color {
        let ctrl = self.registers[PPUCTRL];
        let nt_base = 0x2000 + (ctrl & 0x03) as u16 * 0x0400;
        let table = ((ctrl >> 4) & 1) as u16;

        let tile_col = (x / 8) as u16;
        let tile_row = (y / 8) as u16;
        let tile = self.video_read(nt_base + tile_row * 32 + tile_col) as u16;

        let row = (y % 8) as u16;
        let lo = self.video_read(table * 0x1000 + tile * 16 + row);
        let hi = self.video_read(table * 0x1000 + tile * 16 + row + 8);
        let bit = 7 - (x % 8);
        let value = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);

        let attribute = self.video_read(nt_base + 0x03C0 + (tile_row / 4) * 8 + tile_col / 4);
        let shift = ((tile_row % 4) / 2) * 4 + ((tile_col % 4) / 2) * 2;
        let palette = (attribute >> shift) & 0x03;

        self.palette_color(palette, value)
    }
}

impl BusDevice for Ppu {
    /// The same 8 register bytes are mirrored across the entire mapped
    /// window; only the low 3 address bits matter.
    fn read(&self, address: u16) -> u8 {
        match (address & 0x0007) as usize {
            OAMDATA => self.oam[self.registers[OAMADDR] as usize],
            register => self.registers[register],
        }
    }

    fn write(&mut self, address: u16, data: u8) {
        let register = (address & 0x0007) as usize;
        self.registers[register] = data;
        if register == OAMDATA {
            // OAM data writes land at the OAM address, which increments
            self.oam[self.registers[OAMADDR] as usize] = data;
            self.registers[OAMADDR] = self.registers[OAMADDR].wrapping_add(1);
        }
    }
}
