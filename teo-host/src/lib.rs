//! Host side of a Teonet node
//!
//! Builds the argument vector the runtime is initialized with, exposes the
//! single callback the runtime delivers lifecycle events through, attaches
//! the node identity and hands control to the blocking run loop.

pub mod argv;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod events;
pub mod node;
pub mod runtime;

#[cfg(feature = "test-utils")]
pub mod testing;

pub use argv::ArgumentVector;
pub use callbacks::{
    teo_event_dispatch, DispatchStats, EventCallback, EventDispatcher, LifecycleHandler,
    LoggingHandler,
};
pub use config::{InitFlags, NodeConfig, DEFAULT_PORT};
pub use error::{HostError, HostErrorCode, Result, TeoError};
pub use events::{EventKind, LifecycleEvent, PeerDescriptor, PeerPacket};
pub use node::{HostState, NodeHost, NodeIdentity};
pub use runtime::{NodeHandle, NodeRuntime};

#[cfg(feature = "native")]
pub use runtime::native::NativeRuntime;
