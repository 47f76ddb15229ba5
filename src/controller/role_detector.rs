//! Startup role detection
//!
//! A node with stick hardware attached reads real potentiometer positions on
//! the two stick pins. Without it the ADC lines float and settle near
//! mid-scale, so a node whose stick pins all read inside a narrow band around
//! the middle is taken to be the virtual controller. There is no handshake
//! with the other node.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::state::Role;
use super::PinMap;
use crate::hardware::Board;

// Thresholds for the floating-input probe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleProbeSettings {
    /// Readings taken per pin, at least one
    pub samples: u8,
    /// Exclusive lower bound of the floating band
    pub lower: u16,
    /// Exclusive upper bound of the floating band
    pub upper: u16,
}

impl Default for RoleProbeSettings {
    fn default() -> Self {
        Self {
            samples: 3,
            lower: 400,
            upper: 600,
        }
    }
}

impl RoleProbeSettings {
    fn is_floating(&self, reading: u16) -> bool {
        reading > self.lower && reading < self.upper
    }
}

pub struct RoleDetector<'a> {
    board: &'a dyn Board,
    pins: &'a PinMap,
    settings: &'a RoleProbeSettings,
}

impl<'a> RoleDetector<'a> {
    pub fn new(board: &'a dyn Board, pins: &'a PinMap, settings: &'a RoleProbeSettings) -> Self {
        Self {
            board,
            pins,
            settings,
        }
    }

    /// Classifies the node from its stick pins
    ///
    /// Both pins are read back to back, `samples` times each. Every reading
    /// has to fall inside the floating band for the node to be virtual.
    pub fn detect(&self) -> Role {
        let samples = self.settings.samples.max(1);
        let mut floating = true;

        for round in 0..samples {
            let x = self.board.read_analog(self.pins.stick_x);
            let y = self.board.read_analog(self.pins.stick_y);
            debug!("Role probe round {}: x={} y={}", round, x, y);

            if !(self.settings.is_floating(x) && self.settings.is_floating(y)) {
                floating = false;
            }
        }

        let role = if floating {
            Role::Virtual
        } else {
            Role::Physical
        };
        info!(
            "Detected {} role from pins {}/{} (band {}..{})",
            role, self.pins.stick_x, self.pins.stick_y, self.settings.lower, self.settings.upper
        );
        role
    }
}
