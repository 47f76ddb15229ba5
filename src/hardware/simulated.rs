use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{Board, HardwareButton, PullMode, ANALOG_MAX};

#[derive(Debug, Default)]
struct Pins {
    digital: HashMap<u8, bool>,
    analog: HashMap<u8, u16>,
    buttons: HashMap<HardwareButton, bool>,
    pulls: HashMap<u8, PullMode>,
}

/// In-memory board whose pins are set from code
///
/// Cloning yields another handle to the same pins, so a test can keep one
/// clone to drive the inputs while the controller owns the other.
/// Unset digital pins read high (idle for active-low buttons), unset analog
/// pins read mid-scale.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBoard {
    pins: Arc<Mutex<Pins>>,
}

impl SimulatedBoard {
    pub const ANALOG_IDLE: u16 = 512;

    pub fn new() -> Self {
        Self::default()
    }

    fn pins(&self) -> MutexGuard<'_, Pins> {
        // A panicked writer leaves plain values behind, still usable
        self.pins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_digital(&self, pin: u8, high: bool) {
        self.pins().digital.insert(pin, high);
    }

    pub fn set_analog(&self, pin: u8, value: u16) {
        self.pins().analog.insert(pin, value.min(ANALOG_MAX));
    }

    pub fn set_hardware_button(&self, button: HardwareButton, pressed: bool) {
        self.pins().buttons.insert(button, pressed);
    }

    /// Pull mode last configured for `pin`, if any
    pub fn pull(&self, pin: u8) -> Option<PullMode> {
        self.pins().pulls.get(&pin).copied()
    }
}

impl Board for SimulatedBoard {
    fn read_digital(&self, pin: u8) -> bool {
        self.pins().digital.get(&pin).copied().unwrap_or(true)
    }

    fn read_analog(&self, pin: u8) -> u16 {
        self.pins()
            .analog
            .get(&pin)
            .copied()
            .unwrap_or(Self::ANALOG_IDLE)
    }

    fn hardware_button_pressed(&self, button: HardwareButton) -> bool {
        self.pins().buttons.get(&button).copied().unwrap_or(false)
    }

    fn set_pull(&self, pin: u8, mode: PullMode) {
        debug!("Simulated pin {} pull set to {:?}", pin, mode);
        self.pins().pulls.insert(pin, mode);
    }
}
