//! Sync loop with statum state machine for the two node roles
//!
//! # State Machine
//!
//! ```text
//!          ┌──► Broadcasting  (physical: sample ─► encode ─► send)
//! Idle ────┤
//!          └──► Receiving     (virtual: receive ─► decode ─► cache)
//! ```
//!
//! The transition out of `Idle` happens once, right after role detection.
//! Both running states publish into the same watch channel, so queries read
//! the same [`ControllerSnapshot`] type whatever the role.

use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::codec::{decode_stick, encode_stick};
use super::input_sampler::InputSampler;
use super::state::{ControllerSnapshot, Role};
use super::ControllerSettings;
use crate::hardware::{Board, PullMode};
use crate::radio::{LogicalChannel, Radio, RadioError, RadioPacket};

/// Numeric tag sent alongside the button state; receivers ignore it
pub const BUTTON_MESSAGE_VALUE: i32 = 0;

#[state]
#[derive(Debug, Clone)]
pub enum SyncState {
    Idle,
    Broadcasting,
    Receiving,
}

#[machine]
pub struct SyncLoop<S: SyncState> {
    board: Arc<dyn Board>,
    radio: Arc<dyn Radio>,
    settings: ControllerSettings,
    state: Arc<watch::Sender<ControllerSnapshot>>,
    shutdown: CancellationToken,
}

impl<S: SyncState> SyncLoop<S> {
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }
}

impl SyncLoop<Idle> {
    pub fn create(
        board: Arc<dyn Board>,
        radio: Arc<dyn Radio>,
        settings: ControllerSettings,
        state: Arc<watch::Sender<ControllerSnapshot>>,
        shutdown: CancellationToken,
    ) -> Self {
        debug!("Creating sync loop with settings: {:?}", settings);
        Self::new(board, radio, settings, state, shutdown)
    }

    /// Prepares the button lines and switches to broadcasting
    pub fn start_broadcasting(self) -> SyncLoop<Broadcasting> {
        info!("Configuring digital button pins without pull resistors");
        for pin in self.settings.pins.digital_button_pins() {
            self.board.set_pull(pin, PullMode::None);
        }

        mark_initialised(&self.state, Role::Physical);
        self.transition()
    }

    /// Registers the two receive handlers and switches to receiving
    ///
    /// The handlers stay registered with the radio but stop touching the
    /// state once the shutdown token fires.
    pub fn start_receiving(self) -> Result<SyncLoop<Receiving>, RadioError> {
        let format = self.settings.wire_format;

        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        self.radio.on_receive(
            LogicalChannel::Buttons,
            Arc::new(move |packet: RadioPacket| match packet {
                _ if shutdown.is_cancelled() => {
                    debug!("Controller shut down, dropping button message")
                }
                RadioPacket::Value { name, .. } => {
                    let buttons = format.decode_buttons(&name);
                    state.send_modify(|snapshot| {
                        snapshot.buttons = buttons;
                        snapshot.updates += 1;
                    });
                }
                RadioPacket::Text(text) => {
                    debug!("Ignoring string message on button channel: {:?}", text)
                }
            }),
        )?;

        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        self.radio.on_receive(
            LogicalChannel::Stick,
            Arc::new(move |packet: RadioPacket| match packet {
                _ if shutdown.is_cancelled() => {
                    debug!("Controller shut down, dropping stick message")
                }
                RadioPacket::Text(text) => state.send_modify(|snapshot| {
                    snapshot.stick = decode_stick(&text, snapshot.stick);
                    snapshot.updates += 1;
                }),
                RadioPacket::Value { name, value } => {
                    debug!("Ignoring value message on stick channel: {}={}", name, value)
                }
            }),
        )?;

        info!("Receive handlers registered for button and stick channels");
        mark_initialised(&self.state, Role::Virtual);
        Ok(self.transition())
    }
}

impl SyncLoop<Broadcasting> {
    /// One sample-and-send cycle
    ///
    /// Button state always goes out before stick state. Both sends are
    /// attempted even if the first fails; the first error is returned. The
    /// snapshot is updated even when sending fails.
    pub fn run_cycle(&mut self) -> Result<(), RadioError> {
        let sampler = InputSampler::new(self.board.as_ref(), &self.settings.pins);
        let buttons = sampler.sample_buttons();
        let stick = sampler.sample_stick();

        let encoded_buttons = self.settings.wire_format.encode_buttons(buttons);
        let encoded_stick = encode_stick(stick);
        debug!("Broadcasting buttons={} stick={}", encoded_buttons, encoded_stick);

        self.state.send_modify(|snapshot| {
            snapshot.buttons = buttons;
            snapshot.stick = stick;
            snapshot.updates += 1;
        });

        let buttons_sent = self.radio.send_value(
            LogicalChannel::Buttons,
            &encoded_buttons,
            BUTTON_MESSAGE_VALUE,
        );
        if let Err(e) = &buttons_sent {
            debug!("Button broadcast failed, still sending stick: {}", e);
        }
        let stick_sent = self.radio.send_string(LogicalChannel::Stick, &encoded_stick);
        buttons_sent.and(stick_sent)
    }

    /// Broadcasts until the shutdown token fires
    ///
    /// Never skips a cycle because nothing changed; edge detection belongs to
    /// the event dispatcher.
    pub async fn run(mut self) {
        let period = Duration::from_millis(self.settings.broadcast_interval_ms);
        info!("Starting broadcast loop with {:?} period", period);

        let mut ticker = (!period.is_zero()).then(|| tokio::time::interval(period));
        let mut cycles: u64 = 0;
        let mut failures: u64 = 0;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = next_cycle(&mut ticker) => {}
            }

            if let Err(e) = self.run_cycle() {
                failures += 1;
                warn!("Broadcast failed, retrying next cycle: {}", e);
            }
            cycles += 1;

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
                info!(
                    "Broadcast stats: {} cycles, {} failed in {} seconds ({:.2} cycles/sec)",
                    cycles,
                    failures,
                    elapsed_seconds,
                    cycles as f64 / elapsed_seconds as f64
                );
                cycles = 0;
                failures = 0;
                last_stats_time = now;
            }
        }
        info!("Broadcast loop stopped");
    }
}

impl SyncLoop<Receiving> {
    /// Stays alive until shutdown; all work happens in the receive handlers
    pub async fn run(self) {
        info!("Receive loop running");
        let mut updates = self.state.subscribe();
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);
        let mut last_count = updates.borrow().updates;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        error!("Controller state channel closed");
                        break;
                    }
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let count = updates.borrow_and_update().updates;
                info!(
                    "Receive stats: {} updates in {} seconds",
                    count - last_count,
                    (now - last_stats_time).num_seconds()
                );
                last_count = count;
                last_stats_time = now;
            }
        }
        info!("Receive loop stopped");
    }
}

fn mark_initialised(state: &watch::Sender<ControllerSnapshot>, role: Role) {
    state.send_modify(|snapshot| {
        snapshot.role = Some(role);
        snapshot.initialised = true;
    });
}

async fn next_cycle(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}
