//! MQTT broker as the shared radio medium
//!
//! Each logical channel maps to one topic (`<prefix>/<group>/<channel>`).
//! Publishing uses QoS 0, so a lost message behaves like a lost radio packet.
//! Note that a node also hears its own messages through the broker; the sync
//! core only registers receivers on the virtual side, which never sends.

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{LogicalChannel, MqttSettings, Radio, RadioError, RadioPacket, ReceiveCallback};

const REQUEST_CAPACITY: usize = 100;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

type Handlers = Arc<Mutex<HashMap<LogicalChannel, Vec<ReceiveCallback>>>>;

pub struct MqttRadio {
    client: AsyncClient,
    settings: MqttSettings,
    handlers: Handlers,
    shutdown: CancellationToken,
    event_task: JoinHandle<()>,
}

impl MqttRadio {
    /// Creates the client and spawns the event loop task
    ///
    /// The broker connection is established lazily by the event loop; sends
    /// issued before it is up are queued by the client.
    pub fn connect(settings: MqttSettings) -> Result<Self, RadioError> {
        if settings.host.is_empty() {
            return Err(RadioError::ConnectionError(
                "MQTT host must not be empty".to_string(),
            ));
        }

        let runtime = Handle::try_current().map_err(|e| {
            RadioError::ConnectionError(format!("MQTT radio needs a tokio runtime: {}", e))
        })?;

        let client_id = settings.session_client_id();
        info!(
            "Connecting MQTT radio to {}:{} as {}",
            settings.host, settings.port, client_id
        );
        let mut options = MqttOptions::new(client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(1)));

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let handlers: Handlers = Arc::default();
        let shutdown = CancellationToken::new();

        let event_task = runtime.spawn(run_event_loop(
            event_loop,
            client.clone(),
            settings.clone(),
            handlers.clone(),
            shutdown.clone(),
        ));
        debug!("MQTT event loop spawned");

        Ok(Self {
            client,
            settings,
            handlers,
            shutdown,
            event_task,
        })
    }

    fn publish(&self, channel: LogicalChannel, packet: RadioPacket) -> Result<(), RadioError> {
        let topic = self.settings.topic(channel);
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, packet.to_payload())
            .map_err(|e| RadioError::SendError {
                channel,
                reason: e.to_string(),
            })
    }
}

impl Drop for MqttRadio {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.event_task.abort();
    }
}

impl Radio for MqttRadio {
    fn send_value(
        &self,
        channel: LogicalChannel,
        name: &str,
        value: i32,
    ) -> Result<(), RadioError> {
        self.publish(
            channel,
            RadioPacket::Value {
                name: name.to_string(),
                value,
            },
        )
    }

    fn send_string(&self, channel: LogicalChannel, text: &str) -> Result<(), RadioError> {
        self.publish(channel, RadioPacket::Text(text.to_string()))
    }

    fn on_receive(
        &self,
        channel: LogicalChannel,
        callback: ReceiveCallback,
    ) -> Result<(), RadioError> {
        let topic = self.settings.topic(channel);
        info!("Subscribing to {} for {}", topic, channel);
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| RadioError::SubscribeError {
                channel,
                reason: e.to_string(),
            })?;

        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(channel)
            .or_default()
            .push(callback);
        Ok(())
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    settings: MqttSettings,
    handlers: Handlers,
    shutdown: CancellationToken,
) {
    info!("MQTT event loop started");
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("MQTT event loop stopped");
                return;
            }
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT broker connected");
                resubscribe(&client, &settings, &handlers);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(channel) = settings.channel_for_topic(&publish.topic) else {
                    debug!("Ignoring message on foreign topic {}", publish.topic);
                    continue;
                };
                let payload = String::from_utf8_lossy(&publish.payload);
                match RadioPacket::from_payload(&payload) {
                    Some(packet) => dispatch(&handlers, channel, packet),
                    None => debug!("Ignoring malformed payload on {}: {:?}", channel, payload),
                }
            }
            Ok(other) => debug!("MQTT event: {:?}", other),
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }
}

// Subscriptions do not survive a clean session reconnect
fn resubscribe(client: &AsyncClient, settings: &MqttSettings, handlers: &Handlers) {
    let channels: Vec<LogicalChannel> = handlers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .keys()
        .copied()
        .collect();

    for channel in channels {
        if let Err(e) = client.try_subscribe(settings.topic(channel), QoS::AtMostOnce) {
            error!("Failed to resubscribe to {}: {}", channel, e);
        }
    }
}

fn dispatch(handlers: &Handlers, channel: LogicalChannel, packet: RadioPacket) {
    let callbacks: Vec<ReceiveCallback> = handlers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&channel)
        .cloned()
        .unwrap_or_default();

    debug!("Received {} on {}", packet, channel);
    for callback in callbacks {
        callback(packet.clone());
    }
}
