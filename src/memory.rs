use crate::error::Chip8Error;
use log::info;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the address space the interpreter fetches from and stores to.
/// Every access is bounds-checked; running off the end is reported rather
/// than wrapped.
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), Chip8Error> {
        let bytes = self.get_rw_slice(addr, data.len())?;
        bytes.copy_from_slice(data);
        Ok(())
    }

    /// get a two-byte, big-endian word (instruction fetch)
    fn get_word(&self, addr: u16) -> Result<u16, Chip8Error> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Chip8Error>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error>;
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// largest program that fits between the program address and the top of RAM
pub const CHIP8_PROGRAM_MAX_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// where the hex digit glyphs live, and how far apart they are
pub const CHIP8_FONT_ADDR: u16 = 0x000;
pub const CHIP8_FONT_GLYPH_BYTES: u16 = 5;

/// Defines the contemporary CHIP-8 memory map, 4K configuration:
///   0x0000-0x004f  font
///   0x0050-0x01ff  unused (interpreter on real hardware)
///   0x0200-0x0fff  program
///
/// The stack, registers and display are kept outside of addressable memory.
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Chip8Error> {
        let a = addr as usize;
        self.bytes
            .get_mut(a..a + len)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: a, len })
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error> {
        let a = addr as usize;
        self.bytes
            .get(a..a + len)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: a, len })
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8MemoryMap {
    /// zeroed RAM with the font baked in at 0x000
    pub fn new() -> Self {
        let mut bytes = vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice();
        let font = CHIP8_FONT_ADDR as usize;
        bytes[font..font + CHIP8_FONT.len()].copy_from_slice(&CHIP8_FONT);
        Chip8MemoryMap { bytes }
    }

    /// load a CHIP-8 program at 0x200; on failure memory is untouched
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        if program.len() > CHIP8_PROGRAM_MAX_BYTES {
            return Err(Chip8Error::RomTooLarge {
                size: program.len(),
                max_size: CHIP8_PROGRAM_MAX_BYTES,
            });
        }
        self.write(program, CHIP8_PROGRAM_ADDR)?;
        info!(
            "loaded {} byte program at {:#06x}",
            program.len(),
            CHIP8_PROGRAM_ADDR
        );
        Ok(())
    }

    /// address of the glyph for `digit`; anything above 0xF points past the
    /// end of the font, same as on real interpreters
    pub fn glyph_addr(digit: u8) -> u16 {
        CHIP8_FONT_ADDR + digit as u16 * CHIP8_FONT_GLYPH_BYTES
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

pub const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
