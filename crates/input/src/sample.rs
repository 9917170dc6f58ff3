use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Logical keys the simulation reacts to.
///
/// The input-capture collaborator maps physical devices onto these; the
/// simulation never sees scancodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Fire,
    Brake,
}

impl Key {
    pub const ALL: [Key; 6] = [Key::Up, Key::Down, Key::Left, Key::Right, Key::Fire, Key::Brake];

    const fn bit(self) -> u32 {
        self as u32
    }
}

/// Two-bit key state: bit 0 = pressed, bit 1 = changed this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    pub pressed: bool,
    pub changed: bool,
}

impl KeyState {
    pub const RELEASED: KeyState = KeyState {
        pressed: false,
        changed: false,
    };

    pub fn just_pressed(self) -> bool {
        self.pressed && self.changed
    }

    pub fn just_released(self) -> bool {
        !self.pressed && self.changed
    }
}

/// One frame's captured input for one player.
///
/// Key flags are packed two bits per key so a sample stays one word on the
/// wire; directions are unit-or-zero vectors supplied by the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputSample {
    bits: u32,
    pub accelerate: Vec2,
    pub aim: Vec2,
}

impl InputSample {
    /// The neutral sample: nothing pressed, no direction.
    pub const NEUTRAL: InputSample = InputSample {
        bits: 0,
        accelerate: Vec2::ZERO,
        aim: Vec2::ZERO,
    };

    pub fn key(&self, key: Key) -> KeyState {
        let shift = key.bit() * 2;
        KeyState {
            pressed: self.bits >> shift & 1 != 0,
            changed: self.bits >> shift & 2 != 0,
        }
    }

    pub fn set_key(&mut self, key: Key, state: KeyState) {
        let shift = key.bit() * 2;
        self.bits &= !(0b11 << shift);
        self.bits |= (state.pressed as u32 | (state.changed as u32) << 1) << shift;
    }

    /// Build the next frame's sample from the previous one and the set of
    /// keys currently held, deriving the changed flags by comparison.
    pub fn advance(prev: &InputSample, held: &[Key], accelerate: Vec2, aim: Vec2) -> InputSample {
        let mut next = InputSample {
            bits: 0,
            accelerate,
            aim,
        };
        for key in Key::ALL {
            let pressed = held.contains(&key);
            next.set_key(
                key,
                KeyState {
                    pressed,
                    changed: pressed != prev.key(key).pressed,
                },
            );
        }
        next
    }
}
