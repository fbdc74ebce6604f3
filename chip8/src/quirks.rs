//! Behavioural differences between historical interpreters.
//!
//! Programs were written against whatever interpreter their author had at
//! hand, and those disagree on a handful of instructions. Each toggle picks
//! one side of a known disagreement.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Quirks {
    /// `8XY6` and `8XYE` shift the value of `Vy` and store it in `Vx`.
    ///
    /// When off, `Vx` is shifted in place and `Vy` is ignored.
    pub shift_uses_vy: bool,
    /// `FX55` and `FX65` leave `I` pointing just past the last byte accessed.
    ///
    /// When off, `I` is unchanged.
    pub load_store_increments_index: bool,
    /// Sprite pixels that extend past an edge wrap to the opposite edge.
    ///
    /// When off, those pixels are clipped. The starting coordinate
    /// always wraps.
    pub wrap_sprites: bool,
    /// `8XY1`, `8XY2` and `8XY3` reset `VF` to zero.
    pub logic_resets_vf: bool,
    /// `BXNN` jumps to `XNN + Vx` instead of `NNN + V0`.
    pub jump_uses_vx: bool,
    /// `FX0A` completes when the pressed key is released, instead of
    /// as soon as it is pressed.
    pub key_release_wait: bool,
}

impl Quirks {
    /// Behaviour of the original COSMAC VIP interpreter.
    pub fn cosmac_vip() -> Self {
        Self {
            shift_uses_vy: true,
            load_store_increments_index: true,
            wrap_sprites: false,
            logic_resets_vf: true,
            jump_uses_vx: false,
            key_release_wait: true,
        }
    }

    /// Behaviour of the SUPER-CHIP 1.1 interpreter on the HP-48.
    pub fn super_chip() -> Self {
        Self {
            jump_uses_vx: true,
            ..Self::default()
        }
    }
}
