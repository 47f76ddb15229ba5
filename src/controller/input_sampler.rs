use tracing::trace;

use super::state::{Axis, ButtonId, ButtonSet, StickPosition};
use super::PinMap;
use crate::hardware::{Board, HardwareButton, ANALOG_MAX};

/// Maps a raw 10-bit reading to `[-100, 100]` via `round(raw / 5) - 100`
pub fn normalize_axis(raw: u16) -> i32 {
    let raw = i32::from(raw.min(ANALOG_MAX));
    // raw / 5 never lands on .5, so this is plain rounding
    let scaled = (raw + 2) / 5;
    (scaled - 100).clamp(StickPosition::MIN, StickPosition::MAX)
}

/// Reads buttons and stick straight from the board, physical role only
///
/// Nothing is cached; every call reflects the hardware at that moment.
pub struct InputSampler<'a> {
    board: &'a dyn Board,
    pins: &'a PinMap,
}

impl<'a> InputSampler<'a> {
    pub fn new(board: &'a dyn Board, pins: &'a PinMap) -> Self {
        Self { board, pins }
    }

    pub fn button(&self, button: ButtonId) -> bool {
        let pin = match button {
            ButtonId::A => return self.board.hardware_button_pressed(HardwareButton::A),
            ButtonId::B => return self.board.hardware_button_pressed(HardwareButton::B),
            ButtonId::C => self.pins.button_c,
            ButtonId::D => self.pins.button_d,
            ButtonId::E => self.pins.button_e,
            ButtonId::F => self.pins.button_f,
            ButtonId::Z => self.pins.button_z,
        };
        // Active low
        !self.board.read_digital(pin)
    }

    pub fn axis(&self, axis: Axis) -> i32 {
        let pin = match axis {
            Axis::X => self.pins.stick_x,
            Axis::Y => self.pins.stick_y,
        };
        let raw = self.board.read_analog(pin);
        let value = normalize_axis(raw);
        trace!("Stick {:?} raw={} normalized={}", axis, raw, value);
        value
    }

    pub fn sample_buttons(&self) -> ButtonSet {
        ButtonId::ALL
            .into_iter()
            .filter(|button| self.button(*button))
            .collect()
    }

    pub fn sample_stick(&self) -> StickPosition {
        StickPosition::new(self.axis(Axis::X), self.axis(Axis::Y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedBoard;

    #[test]
    fn normalization_matches_reference_points() {
        assert_eq!(normalize_axis(0), -100);
        assert_eq!(normalize_axis(500), 0);
        assert_eq!(normalize_axis(512), 2);
        assert_eq!(normalize_axis(525), 5);
        assert_eq!(normalize_axis(1000), 100);
        assert_eq!(normalize_axis(1023), 100);
    }

    #[test]
    fn normalization_rounds_to_nearest() {
        // 502 / 5 = 100.4, 503 / 5 = 100.6
        assert_eq!(normalize_axis(502), 0);
        assert_eq!(normalize_axis(503), 1);
    }

    #[test]
    fn digital_buttons_are_active_low() {
        let board = SimulatedBoard::new();
        let pins = PinMap::default();
        board.set_digital(pins.button_c, false);
        board.set_digital(pins.button_d, true);

        let sampler = InputSampler::new(&board, &pins);
        assert!(sampler.button(ButtonId::C));
        assert!(!sampler.button(ButtonId::D));
    }

    #[test]
    fn a_and_b_use_hardware_buttons() {
        let board = SimulatedBoard::new();
        let pins = PinMap::default();
        board.set_hardware_button(HardwareButton::B, true);

        let sampler = InputSampler::new(&board, &pins);
        assert!(!sampler.button(ButtonId::A));
        assert!(sampler.button(ButtonId::B));
    }

    #[test]
    fn samples_follow_hardware_changes() {
        let board = SimulatedBoard::new();
        let pins = PinMap::default();
        let sampler = InputSampler::new(&board, &pins);

        board.set_hardware_button(HardwareButton::A, true);
        board.set_digital(pins.button_z, false);
        board.set_analog(pins.stick_x, 525);
        board.set_analog(pins.stick_y, 1023);

        let expected: ButtonSet = [ButtonId::A, ButtonId::Z].into_iter().collect();
        assert_eq!(sampler.sample_buttons(), expected);
        assert_eq!(sampler.sample_stick(), StickPosition::new(5, 100));

        board.set_digital(pins.button_z, true);
        assert_eq!(sampler.sample_buttons(), ButtonSet::from_bits(0b1));
    }
}
