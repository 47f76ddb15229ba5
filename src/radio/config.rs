use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::LogicalChannel;

/// Client id placeholder that gets a per-node suffix on connect
pub const DEFAULT_CLIENT_ID: &str = "radiopad";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioBackend {
    #[default]
    Mqtt,
    Loopback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub backend: RadioBackend,
    pub mqtt: MqttSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    /// Brokers drop an existing session when another client connects with the
    /// same id. Left at the default (or empty), the id is made unique per
    /// process on connect; a custom id is used as is and must differ between
    /// the two nodes.
    pub client_id: String,
    pub topic_prefix: String,
    /// Radio group; only nodes in the same group hear each other
    pub group: u8,
    pub keep_alive_secs: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            topic_prefix: "radiopad".to_string(),
            group: 1,
            keep_alive_secs: 5,
        }
    }
}

impl MqttSettings {
    pub fn topic(&self, channel: LogicalChannel) -> String {
        format!("{}/{}/{}", self.topic_prefix, self.group, channel.name())
    }

    /// Id actually presented to the broker
    pub fn session_client_id(&self) -> String {
        if !self.client_id.is_empty() && self.client_id != DEFAULT_CLIENT_ID {
            return self.client_id.clone();
        }
        format!(
            "{}-{}-{:x}",
            DEFAULT_CLIENT_ID,
            std::process::id(),
            Utc::now().timestamp_subsec_micros()
        )
    }

    pub fn channel_for_topic(&self, topic: &str) -> Option<LogicalChannel> {
        LogicalChannel::ALL
            .into_iter()
            .find(|channel| self.topic(*channel) == topic)
    }
}
