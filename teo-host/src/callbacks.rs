//! Lifecycle event dispatch
//!
//! The runtime gets exactly one foreign-callable entry point,
//! [`teo_event_dispatch`]. It looks up the [`EventDispatcher`] registered for
//! the calling node and routes the decoded event to a [`LifecycleHandler`].
//! Nothing in here may unwind into the runtime: handler errors and panics are
//! logged and swallowed.

use crate::events::{EventKind, LifecycleEvent, PeerDescriptor, PeerPacket};
use crate::runtime::NodeHandle;
use anyhow::Result;
use dashmap::DashMap;
use std::collections::HashSet;
use std::ffi::{c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use teo_common::logging::{Component, Logger, UNNAMED_NODE};
use teo_common::{log_debug, log_error, log_info, log_trace, log_warn};

/// Signature the runtime uses to deliver events
pub type EventCallback = unsafe extern "C" fn(
    handle: *mut c_void,
    event: c_int,
    data: *mut c_void,
    data_len: usize,
    user_data: *mut c_void,
);

/// Host reactions to lifecycle events
///
/// Handlers run on the runtime's event thread, one call at a time, and must
/// return promptly: blocking here stalls all event delivery and peer I/O.
pub trait LifecycleHandler: Send + Sync {
    fn on_started(&self) -> Result<()> {
        Ok(())
    }

    fn on_peer_connected(&self, _peer: &PeerDescriptor) -> Result<()> {
        Ok(())
    }

    fn on_peer_disconnected(&self, _peer: &PeerDescriptor) -> Result<()> {
        Ok(())
    }

    fn on_data_received(&self, _packet: &PeerPacket) -> Result<()> {
        Ok(())
    }

    fn on_idle(&self) -> Result<()> {
        Ok(())
    }
}

/// Handler that only writes lifecycle changes to the log
pub struct LoggingHandler {
    logger: Logger,
}

impl LoggingHandler {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl LifecycleHandler for LoggingHandler {
    fn on_started(&self) -> Result<()> {
        self.logger.info("node started");
        Ok(())
    }

    fn on_peer_connected(&self, peer: &PeerDescriptor) -> Result<()> {
        log_info!(self.logger, "peer \"{}\" was connected", peer.from);
        Ok(())
    }

    fn on_peer_disconnected(&self, peer: &PeerDescriptor) -> Result<()> {
        log_info!(self.logger, "peer \"{}\" was disconnected", peer.from);
        Ok(())
    }
}

/// Counters describing what the dispatcher did with incoming events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events routed to a handler that returned `Ok`
    pub delivered: u64,
    /// Events with no handler (unknown tags, wrong packets)
    pub ignored: u64,
    /// Events dropped because the payload or ordering was invalid
    pub dropped: u64,
    /// Handler calls that returned an error or panicked
    pub handler_failures: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    ignored: AtomicU64,
    dropped: AtomicU64,
    handler_failures: AtomicU64,
}

/// Routes decoded events to a handler while enforcing the lifecycle order
pub struct EventDispatcher {
    handler: Arc<dyn LifecycleHandler>,
    logger: Logger,
    started: AtomicBool,
    connected: Mutex<HashSet<String>>,
    counters: Counters,
}

impl EventDispatcher {
    pub fn new(handler: Arc<dyn LifecycleHandler>, logger: Logger) -> Self {
        Self {
            handler,
            logger: logger.with_component(Component::Dispatcher),
            started: AtomicBool::new(false),
            connected: Mutex::new(HashSet::new()),
            counters: Counters::default(),
        }
    }

    /// Route one decoded event; never fails
    pub fn dispatch(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Started => {
                if self.started.swap(true, Ordering::SeqCst) {
                    self.logger.warn("duplicate started event dropped");
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                self.guard(EventKind::Started, || self.handler.on_started());
            }
            LifecycleEvent::PeerConnected(peer) => {
                if !self.started.load(Ordering::SeqCst) {
                    log_debug!(self.logger, "peer \"{}\" connected before start", peer.from);
                }
                if !self.peers().insert(peer.from.clone()) {
                    log_debug!(self.logger, "peer \"{}\" reconnected", peer.from);
                }
                self.guard(EventKind::PeerConnected, || {
                    self.handler.on_peer_connected(&peer)
                });
            }
            LifecycleEvent::PeerDisconnected(peer) => {
                if !self.peers().remove(&peer.from) {
                    log_warn!(
                        self.logger.with_peer(peer.from.as_str()),
                        "disconnect for a peer that is not connected dropped"
                    );
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                self.guard(EventKind::PeerDisconnected, || {
                    self.handler.on_peer_disconnected(&peer)
                });
            }
            LifecycleEvent::DataReceived(packet) => {
                self.guard(EventKind::Received, || self.handler.on_data_received(&packet));
            }
            LifecycleEvent::Idle => {
                self.guard(EventKind::Idle, || self.handler.on_idle());
            }
            LifecycleEvent::Ignored(kind) => {
                log_trace!(self.logger, "ignoring event {:?}", kind);
                self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Decode and route a raw callback invocation
    ///
    /// # Safety
    ///
    /// Same contract as [`LifecycleEvent::decode`].
    pub unsafe fn dispatch_raw(&self, tag: c_int, data: *const c_void, data_len: usize) {
        match LifecycleEvent::decode(tag, data, data_len) {
            Ok(event) => self.dispatch(event),
            Err(e) => {
                log_error!(
                    self.logger,
                    "dropping {:?} event with bad payload: {}",
                    EventKind::from_raw(tag),
                    e
                );
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Names of the peers currently connected, sorted
    pub fn connected_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers().iter().cloned().collect();
        peers.sort();
        peers
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            handler_failures: self.counters.handler_failures.load(Ordering::Relaxed),
        }
    }

    fn peers(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still consistent: inserts and removes are atomic
        self.connected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn guard<F>(&self, kind: EventKind, call: F)
    where
        F: FnOnce() -> Result<()>,
    {
        match catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                log_error!(self.logger, "{:?} handler failed: {:#}", kind, e);
                self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
            }
            Err(panic) => {
                log_error!(
                    self.logger,
                    "{:?} handler panicked: {}",
                    kind,
                    panic_message(panic.as_ref())
                );
                self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// Dispatchers keyed by the node handle the runtime passes back on every call
lazy_static::lazy_static! {
    static ref DISPATCHERS: DashMap<usize, Arc<EventDispatcher>> = DashMap::new();
    static ref FALLBACK_LOGGER: Logger =
        Logger::new_root(Component::Dispatcher, UNNAMED_NODE);
}

/// Bind a dispatcher to a node handle, returning the one it replaced
pub fn register_dispatcher(
    handle: NodeHandle,
    dispatcher: Arc<EventDispatcher>,
) -> Option<Arc<EventDispatcher>> {
    DISPATCHERS.insert(handle.key(), dispatcher)
}

pub fn unregister_dispatcher(handle: NodeHandle) -> Option<Arc<EventDispatcher>> {
    DISPATCHERS.remove(&handle.key()).map(|(_, d)| d)
}

/// Remove the binding for `handle` only if it still points at `dispatcher`
///
/// Handles are addresses and the runtime may hand a freed address to a later
/// node; an owner must never remove a binding it did not create.
pub fn unregister_own_dispatcher(handle: NodeHandle, dispatcher: &Arc<EventDispatcher>) -> bool {
    DISPATCHERS
        .remove_if(&handle.key(), |_, bound| Arc::ptr_eq(bound, dispatcher))
        .is_some()
}

pub fn dispatcher_for(handle: NodeHandle) -> Option<Arc<EventDispatcher>> {
    // Clone out of the map so no shard lock is held while handlers run
    DISPATCHERS.get(&handle.key()).map(|entry| Arc::clone(entry.value()))
}

/// The callback registered with the runtime at initialization
///
/// `user_data` is part of the runtime's callback shape and is not used.
///
/// # Safety
///
/// Called by the runtime with the handle it returned from initialization and
/// a payload that is valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn teo_event_dispatch(
    handle: *mut c_void,
    event: c_int,
    data: *mut c_void,
    data_len: usize,
    _user_data: *mut c_void,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let Some(handle) = NodeHandle::from_raw(handle) else {
            log_debug!(FALLBACK_LOGGER, "event {} delivered with a null handle", event);
            return;
        };
        match dispatcher_for(handle) {
            Some(dispatcher) => dispatcher.dispatch_raw(event, data, data_len),
            None => log_debug!(
                FALLBACK_LOGGER,
                "event {} for unregistered node {:p} dropped",
                event,
                handle.as_ptr()
            ),
        }
    }));
    if outcome.is_err() {
        FALLBACK_LOGGER.error("event dispatch panicked");
    }
}
