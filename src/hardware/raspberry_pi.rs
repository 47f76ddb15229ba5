//! Raspberry Pi board
//!
//! Buttons are plain GPIO inputs. The Pi has no ADC, so the stick
//! potentiometers go through an MCP3008 on the SPI bus; analog pin numbers are
//! MCP3008 channels (0-7).

use rppal::gpio::{Bias, Gpio, InputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Board, HardwareButton, HardwareError, PullMode};

const SPI_CLOCK_HZ: u32 = 1_000_000;
const MCP3008_CHANNELS: u8 = 8;

// Wiring of a Raspberry Pi based controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaspberryPiWiring {
    /// SPI bus index (0 or 1) of the MCP3008
    pub spi_bus: u8,
    /// Chip select line (0 or 1) of the MCP3008
    pub spi_slave_select: u8,
    /// BCM pin of hardware button A
    pub button_a_pin: u8,
    /// BCM pin of hardware button B
    pub button_b_pin: u8,
    /// BCM pins of the remaining digital button lines
    pub digital_pins: Vec<u8>,
}

impl Default for RaspberryPiWiring {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            spi_slave_select: 0,
            button_a_pin: 5,
            button_b_pin: 6,
            digital_pins: vec![8, 13, 14, 15, 16],
        }
    }
}

pub struct RaspberryPiBoard {
    inputs: Mutex<HashMap<u8, InputPin>>,
    buttons: Mutex<HashMap<HardwareButton, InputPin>>,
    adc: Mutex<Spi>,
}

impl RaspberryPiBoard {
    pub fn open(wiring: &RaspberryPiWiring) -> Result<Self, HardwareError> {
        info!("Opening Raspberry Pi board: {:?}", wiring);
        let gpio = Gpio::new()?;

        let mut inputs = HashMap::new();
        for pin in &wiring.digital_pins {
            inputs.insert(*pin, gpio.get(*pin)?.into_input());
        }

        // On-board style buttons pull to ground when pressed
        let mut buttons = HashMap::new();
        buttons.insert(
            HardwareButton::A,
            gpio.get(wiring.button_a_pin)?.into_input_pullup(),
        );
        buttons.insert(
            HardwareButton::B,
            gpio.get(wiring.button_b_pin)?.into_input_pullup(),
        );

        let bus = match wiring.spi_bus {
            1 => Bus::Spi1,
            _ => Bus::Spi0,
        };
        let slave_select = match wiring.spi_slave_select {
            1 => SlaveSelect::Ss1,
            _ => SlaveSelect::Ss0,
        };
        let adc = Spi::new(bus, slave_select, SPI_CLOCK_HZ, Mode::Mode0)?;
        debug!("MCP3008 opened on {:?}/{:?}", bus, slave_select);

        Ok(Self {
            inputs: Mutex::new(inputs),
            buttons: Mutex::new(buttons),
            adc: Mutex::new(adc),
        })
    }

    fn read_mcp3008(&self, channel: u8) -> Result<u16, HardwareError> {
        if channel >= MCP3008_CHANNELS {
            return Err(HardwareError::UnknownPin(channel));
        }

        // Start bit, single-ended mode + channel, then clock out 10 bits
        let request = [0x01, (0x08 | channel) << 4, 0x00];
        let mut response = [0u8; 3];
        self.adc
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .transfer(&mut response, &request)?;

        Ok((u16::from(response[1] & 0x03) << 8) | u16::from(response[2]))
    }
}

impl Board for RaspberryPiBoard {
    fn read_digital(&self, pin: u8) -> bool {
        let inputs = self
            .inputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match inputs.get(&pin) {
            Some(input) => input.is_high(),
            None => {
                warn!("Read of unconfigured digital pin {}", pin);
                true
            }
        }
    }

    fn read_analog(&self, pin: u8) -> u16 {
        match self.read_mcp3008(pin) {
            Ok(value) => value,
            Err(e) => {
                warn!("Analog read of channel {} failed: {}", pin, e);
                0
            }
        }
    }

    fn hardware_button_pressed(&self, button: HardwareButton) -> bool {
        let buttons = self
            .buttons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buttons.get(&button).is_some_and(|input| input.is_low())
    }

    fn set_pull(&self, pin: u8, mode: PullMode) {
        let mut inputs = self
            .inputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(input) = inputs.get_mut(&pin) else {
            warn!("Cannot set pull on unconfigured pin {}", pin);
            return;
        };

        let bias = match mode {
            PullMode::None => Bias::Off,
            PullMode::Up => Bias::PullUp,
            PullMode::Down => Bias::PullDown,
        };
        input.set_bias(bias);
        debug!("GPIO {} bias set to {:?}", pin, bias);
    }
}
