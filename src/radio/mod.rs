//! # Radio link between the two controller nodes
//!
//! The sync core uses exactly two logical channels:
//!
//! - [`LogicalChannel::Buttons`] carries value messages, `name` is the encoded
//!   button state and `value` is always `0`
//! - [`LogicalChannel::Stick`] carries string messages of the form `"<x>,<y>"`
//!
//! Delivery is best effort. Nothing is acknowledged or retried; the physical
//! node simply sends its full state again on the next cycle.
//!
//! ```text
//! radio/
//! ├── config.rs     - backend selection and MQTT settings
//! ├── packet.rs     - message representation and payload framing
//! ├── loopback.rs   - in-process linked pair
//! └── mqtt_radio.rs - MQTT broker as the shared medium
//! ```

pub mod config;
pub mod loopback;
pub mod mqtt_radio;
pub mod packet;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use config::{MqttSettings, RadioBackend, RadioConfig};
pub use loopback::LoopbackRadio;
pub use mqtt_radio::MqttRadio;
pub use packet::RadioPacket;

// Logical channel, mapped to a transport address by each backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalChannel {
    Buttons,
    Stick,
}

impl LogicalChannel {
    pub const ALL: [LogicalChannel; 2] = [LogicalChannel::Buttons, LogicalChannel::Stick];

    pub fn name(self) -> &'static str {
        match self {
            LogicalChannel::Buttons => "buttons",
            LogicalChannel::Stick => "stick",
        }
    }
}

impl fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback invoked for every packet received on a channel
pub type ReceiveCallback = Arc<dyn Fn(RadioPacket) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("Failed to send on {channel}: {reason}")]
    SendError {
        channel: LogicalChannel,
        reason: String,
    },

    #[error("Failed to subscribe to {channel}: {reason}")]
    SubscribeError {
        channel: LogicalChannel,
        reason: String,
    },

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Broadcast medium shared by the two nodes
///
/// Sends never block; receive callbacks run on the backend's own context and
/// must not block either.
pub trait Radio: Send + Sync + 'static {
    /// Sends a `(name, value)` pair on `channel`
    fn send_value(&self, channel: LogicalChannel, name: &str, value: i32)
        -> Result<(), RadioError>;

    /// Sends free-form text on `channel`
    fn send_string(&self, channel: LogicalChannel, text: &str) -> Result<(), RadioError>;

    /// Registers `callback` for packets arriving on `channel`
    fn on_receive(
        &self,
        channel: LogicalChannel,
        callback: ReceiveCallback,
    ) -> Result<(), RadioError>;
}
