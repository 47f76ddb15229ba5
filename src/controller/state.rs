//! Shared controller state
//!
//! The whole state of a node lives in one immutable [`ControllerSnapshot`]
//! that is replaced atomically on every update. Readers always see buttons
//! and stick from the same update.

use serde::{Deserialize, Serialize};
use std::fmt;

// Button identifier in canonical wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonId {
    A,
    B,
    C,
    D,
    E,
    F,
    Z,
}

impl ButtonId {
    /// All buttons in canonical order (`A,B,C,D,E,F,Z`)
    pub const ALL: [ButtonId; 7] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::C,
        ButtonId::D,
        ButtonId::E,
        ButtonId::F,
        ButtonId::Z,
    ];

    /// Position of the button in canonical order
    pub fn index(self) -> usize {
        match self {
            ButtonId::A => 0,
            ButtonId::B => 1,
            ButtonId::C => 2,
            ButtonId::D => 3,
            ButtonId::E => 4,
            ButtonId::F => 5,
            ButtonId::Z => 6,
        }
    }

    pub fn letter(self) -> char {
        match self {
            ButtonId::A => 'A',
            ButtonId::B => 'B',
            ButtonId::C => 'C',
            ButtonId::D => 'D',
            ButtonId::E => 'E',
            ButtonId::F => 'F',
            ButtonId::Z => 'Z',
        }
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Set of currently held buttons
///
/// Backed by a 7-bit mask (bit 0 = A … bit 6 = Z), so the set can never hold
/// an unknown button or the same button twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ButtonSet(u8);

impl ButtonSet {
    const MASK: u8 = 0x7f;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(Self::MASK)
    }

    /// Builds a set from a raw bit mask, ignoring bit 7
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, button: ButtonId) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn insert(&mut self, button: ButtonId) {
        self.0 |= button.bit();
    }

    pub fn remove(&mut self, button: ButtonId) {
        self.0 &= !button.bit();
    }

    pub fn set(&mut self, button: ButtonId, pressed: bool) {
        if pressed {
            self.insert(button);
        } else {
            self.remove(button);
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Held buttons in canonical order
    pub fn iter(self) -> impl Iterator<Item = ButtonId> {
        ButtonId::ALL
            .into_iter()
            .filter(move |button| self.contains(*button))
    }
}

impl FromIterator<ButtonId> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = ButtonId>>(iter: I) -> Self {
        let mut set = ButtonSet::empty();
        for button in iter {
            set.insert(button);
        }
        set
    }
}

// Stick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// Normalized stick position, both axes in `[-100, 100]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StickPosition {
    pub x: i32,
    pub y: i32,
}

impl StickPosition {
    pub const MIN: i32 = -100;
    pub const MAX: i32 = 100;

    /// Creates a position, clamping both axes into range
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: x.clamp(Self::MIN, Self::MAX),
            y: y.clamp(Self::MIN, Self::MAX),
        }
    }

    pub fn axis(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

// Node role, fixed once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Physical,
    Virtual,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Physical => write!(f, "physical"),
            Role::Virtual => write!(f, "virtual"),
        }
    }
}

// Controller state shared through the watch channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub role: Option<Role>,
    pub initialised: bool,
    pub buttons: ButtonSet,
    pub stick: StickPosition,

    // Number of updates applied since start
    pub updates: u64,
}

impl ControllerSnapshot {
    /// Button state as seen by queries; always released before initialisation
    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.initialised && self.buttons.contains(button)
    }

    /// Axis value as seen by queries; always zero before initialisation
    pub fn axis(&self, axis: Axis) -> i32 {
        if self.initialised {
            self.stick.axis(axis)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_set_has_set_semantics() {
        let mut set = ButtonSet::empty();
        set.insert(ButtonId::C);
        set.insert(ButtonId::C);
        assert_eq!(set.len(), 1);
        assert!(set.contains(ButtonId::C));

        set.remove(ButtonId::C);
        assert!(set.is_empty());
    }

    #[test]
    fn from_bits_drops_unknown_bit() {
        let set = ButtonSet::from_bits(0xff);
        assert_eq!(set, ButtonSet::all());
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn iter_follows_canonical_order() {
        let set: ButtonSet = [ButtonId::Z, ButtonId::A, ButtonId::D].into_iter().collect();
        let order: Vec<ButtonId> = set.iter().collect();
        assert_eq!(order, vec![ButtonId::A, ButtonId::D, ButtonId::Z]);
    }

    #[test]
    fn stick_position_is_clamped() {
        let stick = StickPosition::new(105, -250);
        assert_eq!(stick, StickPosition { x: 100, y: -100 });
    }

    #[test]
    fn snapshot_reports_defaults_before_initialisation() {
        let snapshot = ControllerSnapshot {
            buttons: ButtonSet::all(),
            stick: StickPosition::new(40, -40),
            ..Default::default()
        };
        assert!(!snapshot.is_pressed(ButtonId::A));
        assert_eq!(snapshot.axis(Axis::X), 0);
        assert_eq!(snapshot.axis(Axis::Y), 0);
    }
}
