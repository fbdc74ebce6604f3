//! Built-in hexadecimal font.
use crate::constants::*;

/// Glyphs for the hexadecimal digits 0 to F.
///
/// Fonts are 5 bytes high, and packed together for historical reasons.
/// Only the upper nibble of each row is used.
#[rustfmt::skip]
pub const FONTSET: [u8; FONTSET_DATA_LENGTH] = [
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

/// Address of the glyph for the given hexadecimal digit.
///
/// Only the lower nibble of `digit` is considered.
#[inline]
pub fn glyph_address(digit: u8) -> Address {
    FONTSET_START + (digit & 0xF) as Address * FONTSET_HEIGHT as Address
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_glyph_address() {
        assert_eq!(glyph_address(0x0), 0x000);
        assert_eq!(glyph_address(0x1), 0x005);
        assert_eq!(glyph_address(0xF), 0x04B);
        // Upper nibble is ignored.
        assert_eq!(glyph_address(0x1A), glyph_address(0xA));
    }

    #[test]
    fn test_font_fits_below_program() {
        assert!(FONTSET_START as usize + FONTSET_DATA_LENGTH <= MEM_START);
    }
}
