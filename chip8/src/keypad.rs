//! Hexadecimal keypad input state.
use crate::constants::*;

/// Keys of the COSMAC VIP hexadecimal keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    /// Every key, in ascending order.
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(key_id as usize)
            .copied()
            .ok_or(InvalidKeyCode(key_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyCode(pub u8);

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "keycode must be in range 0 <= keycode < 16, got {}",
            self.0
        )
    }
}

/// Current key press snapshot. Pressed is a 1 bit, released is a 0 bit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keypad(u16);

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        let mask = 1 << key.as_u8();
        if pressed {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    #[inline]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.0 & (1 << key.as_u8()) != 0
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// Retrieve the lowest key that is pressed down.
    #[inline]
    pub fn first(&self) -> Option<KeyCode> {
        if self.any() {
            KeyCode::try_from(self.0.trailing_zeros() as u8).ok()
        } else {
            None
        }
    }

    /// Iterate the keys that are pressed down.
    pub fn pressed(&self) -> impl Iterator<Item = KeyCode> + '_ {
        KeyCode::ALL
            .into_iter()
            .filter(move |key| self.is_pressed(*key))
    }

    /// Set all keys to up.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Raw bit mask, bit `n` is key `n`.
    #[inline(always)]
    pub fn bits(&self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut keypad = Keypad::new();

        keypad.set(KeyCode::Key0, true);
        assert_eq!(keypad.bits(), 0b00000000_00000001);
        assert!(keypad.is_pressed(KeyCode::Key0));
        assert!(!keypad.is_pressed(KeyCode::Key1));
        assert!(!keypad.is_pressed(KeyCode::Key7));

        keypad.set(KeyCode::Key7, true);
        assert_eq!(keypad.bits(), 0b00000000_10000001);
        assert!(keypad.is_pressed(KeyCode::Key0));
        assert!(keypad.is_pressed(KeyCode::Key7));

        keypad.set(KeyCode::Key0, false);
        assert_eq!(keypad.bits(), 0b00000000_10000000);
        assert!(!keypad.is_pressed(KeyCode::Key0));
        assert!(keypad.is_pressed(KeyCode::Key7));

        keypad.set(KeyCode::KeyF, true);
        assert_eq!(keypad.bits(), 0b10000000_10000000);
        assert!(keypad.is_pressed(KeyCode::KeyF));
        assert_eq!(keypad.first(), Some(KeyCode::Key7));
        assert_eq!(
            keypad.pressed().collect::<Vec<_>>(),
            vec![KeyCode::Key7, KeyCode::KeyF]
        );

        keypad.clear();
        assert!(!keypad.any());
        assert_eq!(keypad.first(), None);
    }

    #[test]
    fn test_keycode_conversion() {
        for k in 0..KEY_COUNT {
            let key = KeyCode::try_from(k).unwrap();
            assert_eq!(u8::from(key), k);
        }
        assert_eq!(KeyCode::try_from(16), Err(InvalidKeyCode(16)));
        assert_eq!(KeyCode::KeyA.to_string(), "ka");
    }
}
