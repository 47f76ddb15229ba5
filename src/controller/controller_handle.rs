//! Controller Handle - Unified API for both controller roles
//!
//! Owns the shared [`ControllerSnapshot`], runs role detection once and starts
//! the matching sync loop. Queries look the same on both nodes:
//!
//! - physical node: buttons and stick are read live from the board
//! - virtual node: buttons and stick are the last values received by radio
//!
//! Before [`ControllerHandle::initialise`] every button reads released and
//! every axis reads zero.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::WireFormat;
use super::event_dispatcher::{spawn_dispatcher, ButtonHandler, DispatchHandle, Transition};
use super::input_sampler::InputSampler;
use super::role_detector::{RoleDetector, RoleProbeSettings};
use super::state::{Axis, ButtonId, ControllerSnapshot, Role};
use super::sync_loop::SyncLoop;
use crate::hardware::Board;
use crate::radio::{Radio, RadioError};

/// Pin assignment of the controller board
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub button_c: u8,
    pub button_d: u8,
    pub button_e: u8,
    pub button_f: u8,
    pub button_z: u8,
    pub stick_x: u8,
    pub stick_y: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            button_c: 13,
            button_d: 14,
            button_e: 15,
            button_f: 16,
            button_z: 8,
            stick_x: 1,
            stick_y: 2,
        }
    }
}

impl PinMap {
    /// The five raw digital button lines (C, D, E, F, Z)
    pub fn digital_button_pins(&self) -> [u8; 5] {
        [
            self.button_c,
            self.button_d,
            self.button_e,
            self.button_f,
            self.button_z,
        ]
    }
}

/// Configuration settings for the controller core
///
/// # Examples
///
/// ```rust
/// use radiopad::controller::{ControllerSettings, WireFormat};
///
/// let settings = ControllerSettings {
///     broadcast_interval_ms: 10,
///     wire_format: WireFormat::Hex,
///     ..Default::default()
/// };
/// assert_eq!(settings.dispatch_interval_ms, 20);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub pins: PinMap,

    pub role_probe: RoleProbeSettings,

    /// Pause between broadcast cycles in milliseconds
    ///
    /// `0` only yields to the scheduler between cycles.
    pub broadcast_interval_ms: u64,

    /// Polling period of every button handler in milliseconds
    pub dispatch_interval_ms: u64,

    /// Button encoding; both nodes must agree
    pub wire_format: WireFormat,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            pins: PinMap::default(),
            role_probe: RoleProbeSettings::default(),
            broadcast_interval_ms: 20,
            dispatch_interval_ms: 20,
            wire_format: WireFormat::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Radio error: {0}")]
    RadioError(#[from] RadioError),

    #[error("Controller has been shut down")]
    ShutDown,

    #[error("No tokio runtime to run the controller on: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

struct ControllerInner {
    board: Arc<dyn Board>,
    radio: Arc<dyn Radio>,
    settings: ControllerSettings,
    state: Arc<watch::Sender<ControllerSnapshot>>,
    shutdown: CancellationToken,
    init_lock: Mutex<()>,
}

/// Handle to one controller node
///
/// Cheap to clone; all clones share the same state and tasks.
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<ControllerInner>,
}

impl ControllerHandle {
    /// Creates an uninitialised controller; nothing is read or sent yet
    pub fn new(
        board: Arc<dyn Board>,
        radio: Arc<dyn Radio>,
        settings: Option<ControllerSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Creating controller with settings: {:?}", settings);

        let (state, _) = watch::channel(ControllerSnapshot::default());
        Self {
            inner: Arc::new(ControllerInner {
                board,
                radio,
                settings,
                state: Arc::new(state),
                shutdown: CancellationToken::new(),
                init_lock: Mutex::new(()),
            }),
        }
    }

    /// Detects the role and starts the sync loop
    ///
    /// Runs at most once; later calls return the role fixed by the first
    /// successful call, even after shutdown.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::ShutDown`] if the controller was shut down before
    ///   it was ever initialised
    /// - [`ControllerError::NoRuntime`] when called outside a tokio runtime
    /// - [`ControllerError::RadioError`] if the virtual node cannot register
    ///   its receive handlers
    ///
    /// The controller stays uninitialised on error.
    pub fn initialise(&self) -> Result<Role, ControllerError> {
        let _guard = self
            .inner
            .init_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(role) = self.role() {
            warn!("Controller already initialised as {}", role);
            return Ok(role);
        }
        if self.is_shut_down() {
            warn!("Refusing to initialise a controller that was shut down");
            return Err(ControllerError::ShutDown);
        }
        let runtime = Handle::try_current()?;

        let settings = &self.inner.settings;
        let role = RoleDetector::new(
            self.inner.board.as_ref(),
            &settings.pins,
            &settings.role_probe,
        )
        .detect();

        let idle = SyncLoop::create(
            self.inner.board.clone(),
            self.inner.radio.clone(),
            settings.clone(),
            self.inner.state.clone(),
            self.inner.shutdown.child_token(),
        );

        match role {
            Role::Physical => {
                let broadcasting = idle.start_broadcasting();
                runtime.spawn(broadcasting.run());
            }
            Role::Virtual => {
                let receiving = idle.start_receiving()?;
                runtime.spawn(receiving.run());
            }
        }

        info!("Controller initialised as {} node", role);
        Ok(role)
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.state.borrow().role
    }

    pub fn is_initialised(&self) -> bool {
        self.inner.state.borrow().initialised
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    pub fn button_is_pressed(&self, button: ButtonId) -> bool {
        let snapshot = self.snapshot();
        match snapshot.role {
            Some(Role::Physical) if snapshot.initialised => self.sampler().button(button),
            _ => snapshot.is_pressed(button),
        }
    }

    /// Stick axis in `[-100, 100]`
    pub fn stick_position(&self, axis: Axis) -> i32 {
        let snapshot = self.snapshot();
        match snapshot.role {
            Some(Role::Physical) if snapshot.initialised => self.sampler().axis(axis),
            _ => snapshot.axis(axis),
        }
    }

    /// Consistent copy of the whole state
    ///
    /// Buttons and stick always come from the same update.
    pub fn snapshot(&self) -> ControllerSnapshot {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state update
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        debug!("New subscriber to controller state");
        self.inner.state.subscribe()
    }

    /// Runs `handler` every time `button` makes `transition`
    ///
    /// The button state at registration time seeds the edge detector, so a
    /// button already held does not fire a `Pressed` handler. Works before
    /// initialisation too; the button reads released until then.
    ///
    /// # Errors
    ///
    /// [`ControllerError::NoRuntime`] when called outside a tokio runtime.
    pub fn on_button<F>(
        &self,
        button: ButtonId,
        transition: Transition,
        handler: F,
    ) -> Result<DispatchHandle, ControllerError>
    where
        F: FnMut() + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let controller = self.clone();
        let handler: ButtonHandler = Box::new(handler);
        Ok(spawn_dispatcher(
            &runtime,
            button,
            transition,
            move || controller.button_is_pressed(button),
            handler,
            Duration::from_millis(self.inner.settings.dispatch_interval_ms),
            self.inner.shutdown.child_token(),
        ))
    }

    /// Stops the sync loop and every button handler
    pub fn shutdown(&self) {
        info!("Shutting down controller");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn sampler(&self) -> InputSampler<'_> {
        InputSampler::new(self.inner.board.as_ref(), &self.inner.settings.pins)
    }
}
