//! Controller synchronization core
//!
//! Keeps two boards showing the same controller state:
//!
//! 1. [`role_detector`] - decides once at startup whether this node is physical or virtual
//! 2. [`input_sampler`] - reads buttons and stick on the physical node
//! 3. [`codec`] - turns button and stick state into wire text and back
//! 4. [`sync_loop`] - broadcasts (physical) or receives and caches (virtual)
//! 5. [`event_dispatcher`] - runs handlers on press/release edges
//! 6. [`controller_handle`] - unified query API and lifecycle
//!
//! # Architecture
//!
//! ```text
//! physical node                               virtual node
//! Board ──► InputSampler ──► Codec ──► Radio ──► Codec ──► ControllerSnapshot
//!                │                                               │
//!                └──────────► queries / EventDispatcher ◄────────┘
//! ```

pub mod codec;
pub mod controller_handle;
pub mod event_dispatcher;
pub mod input_sampler;
pub mod role_detector;
pub mod state;
pub mod sync_loop;

pub use codec::WireFormat;
pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings, PinMap};
pub use event_dispatcher::{DispatchHandle, EdgeDetector, Transition};
pub use role_detector::RoleProbeSettings;
pub use state::{Axis, ButtonId, ButtonSet, ControllerSnapshot, Role, StickPosition};
