/// Internal resolution of the CHIP-8 screen.
pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// bytes needed to hold the screen at one bit per pixel
pub const SCREEN_PACKED_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;

/// 1-bit framebuffer. Coordinates start top-left, and anything off the edge
/// wraps back round (`x mod width`, `y mod height`).
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: [[bool; SCREEN_WIDTH]; SCREEN_HEIGHT],
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.pixels.iter() {
            let line: String = row.iter().map(|&p| if p { '#' } else { '.' }).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: [[false; SCREEN_WIDTH]; SCREEN_HEIGHT],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[y % SCREEN_HEIGHT][x % SCREEN_WIDTH]
    }

    /// XOR a lit sprite pixel onto the screen; true if that turned a pixel off
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let px = &mut self.pixels[y % SCREEN_HEIGHT][x % SCREEN_WIDTH];
        *px = !*px;
        !*px
    }

    pub fn clear(&mut self) {
        self.pixels = [[false; SCREEN_WIDTH]; SCREEN_HEIGHT];
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().flatten().all(|&p| !p)
    }

    /// row-major, 8 pixels per byte, most significant bit leftmost; the
    /// layout display devices expect
    pub fn to_packed(&self) -> [u8; SCREEN_PACKED_BYTES] {
        let mut packed = [0u8; SCREEN_PACKED_BYTES];
        for (y, row) in self.pixels.iter().enumerate() {
            for (x, &lit) in row.iter().enumerate() {
                if lit {
                    let n = y * SCREEN_WIDTH + x;
                    packed[n / 8] |= 0x80 >> (n % 8);
                }
            }
        }
        packed
    }
}
