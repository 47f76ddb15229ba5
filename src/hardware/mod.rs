//! Hardware abstraction for the controller board
//!
//! The sync core only ever talks to a [`Board`]. Two boards ship with the
//! crate:
//!
//! - [`simulated::SimulatedBoard`] - in-memory pins, used by tests and desktop runs
//! - [`raspberry_pi::RaspberryPiBoard`] - GPIO buttons and an MCP3008 ADC for the stick

pub mod raspberry_pi;
pub mod simulated;

use serde::{Deserialize, Serialize};

pub use raspberry_pi::RaspberryPiBoard;
pub use simulated::SimulatedBoard;

/// Highest value returned by [`Board::read_analog`] (10-bit ADC)
pub const ANALOG_MAX: u16 = 1023;

// Dedicated on-board buttons with their own "is pressed" capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareButton {
    A,
    B,
}

// Pull resistor configuration for digital inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PullMode {
    None,
    Up,
    Down,
}

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("Pin {0} is not configured on this board")]
    UnknownPin(u8),
}

/// Pin-level access to the board a node runs on
///
/// Reads are infallible from the caller's point of view: a board that fails
/// to read a pin logs the failure and reports an idle value.
pub trait Board: Send + Sync + 'static {
    /// Digital level of `pin`, `true` for high
    fn read_digital(&self, pin: u8) -> bool;

    /// Analog reading of `pin` in `0..=1023`
    fn read_analog(&self, pin: u8) -> u16;

    fn hardware_button_pressed(&self, button: HardwareButton) -> bool;

    /// Configures the pull resistor of a digital input. Only used at init.
    fn set_pull(&self, pin: u8, mode: PullMode);
}
