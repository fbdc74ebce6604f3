//! Monochrome display buffer.
use std::fmt::{self, Write};

use crate::constants::*;

/// 64×32 grid of pixels, row-major, each pixel either 0 or 1.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Box<[u8; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([0; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lit = self.pixels.iter().filter(|px| **px != 0).count();
        f.debug_struct("Framebuffer").field("lit", &lit).finish()
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Read-only view of all 2048 pixel values.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.pixels[..]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT {
            Some(self.pixels[x + y * DISPLAY_WIDTH])
        } else {
            None
        }
    }

    /// Iterate rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks_exact(DISPLAY_WIDTH)
    }

    pub(crate) fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// XOR a sprite onto the buffer with its top-left corner at `(x, y)`.
    ///
    /// The starting coordinate always wraps around the display. Pixels that
    /// extend past the right or bottom edge either wrap as well, or are
    /// clipped, depending on `wrap`.
    ///
    /// Returns `true` when a set pixel was erased, which is a collision.
    pub(crate) fn draw_sprite(&mut self, x: u8, y: u8, sprite: &[u8], wrap: bool) -> bool {
        let x0 = x as usize % DISPLAY_WIDTH;
        let y0 = y as usize % DISPLAY_HEIGHT;
        let mut is_erased = false;

        for (r, row) in sprite.iter().enumerate() {
            let py = y0 + r;
            if py >= DISPLAY_HEIGHT && !wrap {
                break;
            }
            let py = py % DISPLAY_HEIGHT;

            // Each row is 8 bits representing the 8 pixels of the sprite.
            for c in 0..SPRITE_WIDTH {
                let px = x0 + c;
                if px >= DISPLAY_WIDTH && !wrap {
                    break;
                }
                let px = px % DISPLAY_WIDTH;

                let new_px = (row >> (7 - c)) & 1;
                if new_px == 0 {
                    continue;
                }

                let d = px + py * DISPLAY_WIDTH;

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= self.pixels[d] == 1;
                self.pixels[d] ^= 1;
            }
        }

        is_erased
    }

    /// Render the buffer as text, `#` for lit pixels and `.` for dark ones.
    pub fn dump(&self) -> Result<String, fmt::Error> {
        let mut buf = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT);

        for row in self.rows() {
            for px in row {
                buf.write_char(if *px != 0 { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_draw_collision() {
        let mut display = Framebuffer::new();

        // Draw two sprites overlapping by their zero bits.
        // The zero bits of the second draw must not erase
        // the pixels of the first draw.
        //
        // ____####, no collision
        // ########, no collision
        assert!(!display.draw_sprite(4, 0, &[0b11110000], false));
        assert!(!display.draw_sprite(0, 0, &[0b11110000], false));
        assert!((0..8).all(|x| display.get(x, 0) == Some(1)));

        // Overlapping set bits are erased.
        assert!(display.draw_sprite(0, 0, &[0b10000000], false));
        assert_eq!(display.get(0, 0), Some(0));
    }

    #[test]
    fn test_double_draw_restores() {
        let mut display = Framebuffer::new();
        let glyph = [0xF0, 0x90, 0xF0, 0x90, 0xF0];

        assert!(!display.draw_sprite(10, 12, &glyph, false));
        let drawn = display.clone();
        assert_ne!(drawn, Framebuffer::new());

        assert!(display.draw_sprite(10, 12, &glyph, false));
        assert_eq!(display, Framebuffer::new());
    }

    #[test]
    fn test_start_coordinate_wraps() {
        let mut display = Framebuffer::new();
        display.draw_sprite(64 + 3, 32 + 2, &[0b10000000], false);
        assert_eq!(display.get(3, 2), Some(1));
    }

    #[test]
    fn test_clip_edges() {
        let mut display = Framebuffer::new();
        display.draw_sprite(62, 31, &[0xFF, 0xFF], false);

        assert_eq!(display.get(62, 31), Some(1));
        assert_eq!(display.get(63, 31), Some(1));
        // Nothing spilled onto the left or top edges.
        assert_eq!(display.as_slice().iter().filter(|px| **px == 1).count(), 2);
    }

    #[test]
    fn test_wrap_edges() {
        let mut display = Framebuffer::new();
        display.draw_sprite(62, 31, &[0xFF, 0xFF], true);

        assert_eq!(display.get(63, 31), Some(1));
        assert_eq!(display.get(0, 31), Some(1));
        assert_eq!(display.get(5, 31), Some(1));
        assert_eq!(display.get(62, 0), Some(1));
        assert_eq!(display.get(0, 0), Some(1));
        assert_eq!(display.as_slice().iter().filter(|px| **px == 1).count(), 16);
    }

    #[test]
    fn test_dump() {
        let mut display = Framebuffer::new();
        display.draw_sprite(0, 0, &[0b11000000], false);
        let text = display.dump().unwrap();
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("##."));
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert_eq!(text.lines().count(), DISPLAY_HEIGHT);
    }
}
