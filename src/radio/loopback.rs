use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use super::{LogicalChannel, Radio, RadioError, RadioPacket, ReceiveCallback};

type Handlers = Arc<Mutex<HashMap<LogicalChannel, Vec<ReceiveCallback>>>>;

#[derive(Debug, Default)]
struct LinkStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// One end of an in-process radio link
///
/// Packets sent on one end are delivered synchronously to the callbacks
/// registered on the other end, never to the sender itself. Delivery can be
/// suspended with [`LoopbackRadio::set_dropping`] to simulate lost packets.
#[derive(Clone)]
pub struct LoopbackRadio {
    local: Handlers,
    peer: Handlers,
    dropping: Arc<AtomicBool>,
    stats: Arc<LinkStats>,
}

impl LoopbackRadio {
    /// Creates two linked ends sharing one medium
    pub fn pair() -> (Self, Self) {
        let first: Handlers = Arc::default();
        let second: Handlers = Arc::default();
        let dropping = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(LinkStats::default());

        debug!("Created loopback radio pair");
        (
            Self {
                local: first.clone(),
                peer: second.clone(),
                dropping: dropping.clone(),
                stats: stats.clone(),
            },
            Self {
                local: second,
                peer: first,
                dropping,
                stats,
            },
        )
    }

    /// Drops every packet on the link while `dropping` is true
    pub fn set_dropping(&self, dropping: bool) {
        self.dropping.store(dropping, Ordering::SeqCst);
    }

    /// Packets that reached at least the medium and were not dropped
    pub fn delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::SeqCst)
    }

    fn deliver(&self, channel: LogicalChannel, packet: RadioPacket) {
        if self.dropping.load(Ordering::SeqCst) {
            trace!("Dropping {} on {}", packet, channel);
            self.stats.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        }

        // Clone out so callbacks run without the lock held
        let callbacks: Vec<ReceiveCallback> = self
            .peer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&channel)
            .cloned()
            .unwrap_or_default();

        self.stats.delivered.fetch_add(1, Ordering::SeqCst);
        for callback in callbacks {
            callback(packet.clone());
        }
    }
}

impl Radio for LoopbackRadio {
    fn send_value(
        &self,
        channel: LogicalChannel,
        name: &str,
        value: i32,
    ) -> Result<(), RadioError> {
        self.deliver(
            channel,
            RadioPacket::Value {
                name: name.to_string(),
                value,
            },
        );
        Ok(())
    }

    fn send_string(&self, channel: LogicalChannel, text: &str) -> Result<(), RadioError> {
        self.deliver(channel, RadioPacket::Text(text.to_string()));
        Ok(())
    }

    fn on_receive(
        &self,
        channel: LogicalChannel,
        callback: ReceiveCallback,
    ) -> Result<(), RadioError> {
        debug!("Registering loopback receiver on {}", channel);
        self.local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(channel)
            .or_default()
            .push(callback);
        Ok(())
    }
}
