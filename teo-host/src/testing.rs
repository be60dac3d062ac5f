//! In-process stand-in for the node runtime
//!
//! [`SimulatedRuntime`] follows the native threading model: `run` blocks the
//! caller while a dedicated event thread invokes the registered callback.
//! Events are scripted through a [`SimulatedControl`], which can be cloned
//! and used from any thread.

use crate::argv::ArgumentVector;
use crate::callbacks::EventCallback;
use crate::config::InitFlags;
use crate::error::{HostError, Result};
use crate::events::{
    CorePacketData, EV_K_CONNECTED, EV_K_DISCONNECTED, EV_K_IDLE, EV_K_RECEIVED, EV_K_STARTED,
};
use crate::runtime::{NodeHandle, NodeRuntime};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Identity writes observed by the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedIdentity {
    pub application_type: Option<String>,
    pub application_version: Option<String>,
    pub type_writes: usize,
    pub version_writes: usize,
    /// Identity writes that arrived while the run loop was active
    pub writes_after_run: usize,
}

#[derive(Debug)]
enum SimCommand {
    Started,
    Connected { peer: String, addr: Option<String>, port: u16 },
    Disconnected { peer: String },
    Received { peer: String, cmd: u8, data: Vec<u8> },
    Idle,
    Raw { tag: c_int },
    Shutdown { status: i32 },
}

/// Scripts events for a [`SimulatedRuntime`]
#[derive(Clone)]
pub struct SimulatedControl {
    tx: UnboundedSender<SimCommand>,
}

impl SimulatedControl {
    fn send(&self, command: SimCommand) {
        // After shutdown the event thread is gone; late commands are dropped
        let _ = self.tx.send(command);
    }

    /// Deliver an extra `Started` (the run loop always sends the first one)
    pub fn started(&self) {
        self.send(SimCommand::Started);
    }

    pub fn peer_connected(&self, peer: &str) {
        self.send(SimCommand::Connected {
            peer: peer.to_string(),
            addr: None,
            port: 0,
        });
    }

    pub fn peer_connected_at(&self, peer: &str, addr: &str, port: u16) {
        self.send(SimCommand::Connected {
            peer: peer.to_string(),
            addr: Some(addr.to_string()),
            port,
        });
    }

    pub fn peer_disconnected(&self, peer: &str) {
        self.send(SimCommand::Disconnected {
            peer: peer.to_string(),
        });
    }

    pub fn data_received(&self, peer: &str, cmd: u8, data: &[u8]) {
        self.send(SimCommand::Received {
            peer: peer.to_string(),
            cmd,
            data: data.to_vec(),
        });
    }

    pub fn idle(&self) {
        self.send(SimCommand::Idle);
    }

    /// Deliver an arbitrary tag with a null payload
    pub fn raw(&self, tag: c_int) {
        self.send(SimCommand::Raw { tag });
    }

    /// End the run loop; `run` returns `status`
    pub fn shutdown(&self, status: i32) {
        self.send(SimCommand::Shutdown { status });
    }
}

struct Inner {
    failure: Option<String>,
    // Its address is the node handle
    token: Box<u8>,
    tx: UnboundedSender<SimCommand>,
    rx: Mutex<Option<UnboundedReceiver<SimCommand>>>,
    callback: Mutex<Option<EventCallback>>,
    identity: Mutex<RecordedIdentity>,
    seen_args: Mutex<Vec<Vec<u8>>>,
    seen_flags: Mutex<Option<InitFlags>>,
    running: AtomicBool,
}

/// Test double for the node runtime
///
/// Clones share state, so a test can keep one clone for inspection while a
/// `NodeHost` owns another.
#[derive(Clone)]
pub struct SimulatedRuntime {
    inner: Arc<Inner>,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A runtime whose `init` always fails with `reason`
    pub fn failing(reason: &str) -> Self {
        Self::build(Some(reason.to_string()))
    }

    fn build(failure: Option<String>) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                failure,
                token: Box::new(0),
                tx,
                rx: Mutex::new(Some(rx)),
                callback: Mutex::new(None),
                identity: Mutex::new(RecordedIdentity::default()),
                seen_args: Mutex::new(Vec::new()),
                seen_flags: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn control(&self) -> SimulatedControl {
        SimulatedControl {
            tx: self.inner.tx.clone(),
        }
    }

    pub fn identity(&self) -> RecordedIdentity {
        lock(&self.inner.identity).clone()
    }

    /// Arguments as read through the `argv` pointer array during `init`
    pub fn seen_args(&self) -> Vec<Vec<u8>> {
        lock(&self.inner.seen_args).clone()
    }

    pub fn seen_flags(&self) -> Option<InitFlags> {
        *lock(&self.inner.seen_flags)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn handle(&self) -> Option<NodeHandle> {
        NodeHandle::from_raw(&*self.inner.token as *const u8 as *mut c_void)
    }

    fn check_handle(&self, handle: NodeHandle) -> Result<()> {
        if Some(handle) == self.handle() {
            Ok(())
        } else {
            Err(HostError::Runtime {
                message: format!("unknown node handle {:p}", handle.as_ptr()),
            })
        }
    }

    fn record_identity(&self, update: impl FnOnce(&mut RecordedIdentity)) {
        let mut identity = lock(&self.inner.identity);
        if self.is_running() {
            identity.writes_after_run += 1;
        }
        update(&mut identity);
    }
}

impl NodeRuntime for SimulatedRuntime {
    fn init(
        &self,
        argv: &mut ArgumentVector,
        callback: EventCallback,
        flags: InitFlags,
    ) -> Result<NodeHandle> {
        // Read the vector the way a native loader would: through the pointers
        let argc = argv.argc() as usize;
        let raw = argv.as_mut_ptr();
        let mut seen = Vec::with_capacity(argc);
        for i in 0..argc {
            let arg = unsafe { CStr::from_ptr(*raw.add(i) as *const c_char) };
            seen.push(arg.to_bytes().to_vec());
        }
        *lock(&self.inner.seen_args) = seen;
        *lock(&self.inner.seen_flags) = Some(flags);

        if let Some(reason) = &self.inner.failure {
            return Err(HostError::InitializationFailure {
                reason: reason.clone(),
            });
        }
        *lock(&self.inner.callback) = Some(callback);
        self.handle().ok_or_else(|| HostError::InitializationFailure {
            reason: "simulated handle is null".to_string(),
        })
    }

    fn set_application_type(&self, handle: NodeHandle, app_type: &CStr) -> Result<()> {
        self.check_handle(handle)?;
        let value = app_type.to_string_lossy().into_owned();
        self.record_identity(|identity| {
            identity.application_type = Some(value);
            identity.type_writes += 1;
        });
        Ok(())
    }

    fn set_application_version(&self, handle: NodeHandle, version: &CStr) -> Result<()> {
        self.check_handle(handle)?;
        let value = version.to_string_lossy().into_owned();
        self.record_identity(|identity| {
            identity.application_version = Some(value);
            identity.version_writes += 1;
        });
        Ok(())
    }

    fn run(&self, handle: NodeHandle) -> Result<i32> {
        self.check_handle(handle)?;
        let callback = (*lock(&self.inner.callback)).ok_or_else(|| HostError::Runtime {
            message: "run called before init".to_string(),
        })?;
        let mut rx = lock(&self.inner.rx).take().ok_or_else(|| HostError::Runtime {
            message: "run loop already consumed".to_string(),
        })?;

        self.inner.running.store(true, Ordering::SeqCst);
        let node = handle.as_ptr() as usize;
        let events = std::thread::Builder::new()
            .name("teo-sim-events".to_string())
            .spawn(move || {
                let node = node as *mut c_void;
                deliver(callback, node, &SimCommand::Started);
                while let Some(command) = rx.blocking_recv() {
                    if let SimCommand::Shutdown { status } = command {
                        return status;
                    }
                    deliver(callback, node, &command);
                }
                0
            })
            .map_err(|e| HostError::Runtime {
                message: format!("failed to spawn event thread: {e}"),
            });

        let outcome = match events {
            Ok(thread) => thread.join().map_err(|_| HostError::Runtime {
                message: "event thread panicked".to_string(),
            }),
            Err(e) => Err(e),
        };
        self.inner.running.store(false, Ordering::SeqCst);
        outcome
    }

    fn stop(&self, handle: NodeHandle) -> Result<()> {
        self.check_handle(handle)?;
        self.control().shutdown(0);
        Ok(())
    }
}

fn deliver(callback: EventCallback, node: *mut c_void, command: &SimCommand) {
    match command {
        SimCommand::Started => fire(callback, node, EV_K_STARTED, std::ptr::null_mut(), 0),
        SimCommand::Idle => fire(callback, node, EV_K_IDLE, std::ptr::null_mut(), 0),
        SimCommand::Raw { tag } => fire(callback, node, *tag, std::ptr::null_mut(), 0),
        SimCommand::Connected { peer, addr, port } => {
            let from = c_string(peer);
            let addr = addr.as_deref().map(c_string);
            let mut packet = peer_packet(&from);
            if let Some(addr) = &addr {
                packet.addr = addr.as_ptr() as *mut c_char;
            }
            packet.port = c_int::from(*port);
            fire_packet(callback, node, EV_K_CONNECTED, &mut packet);
        }
        SimCommand::Disconnected { peer } => {
            let from = c_string(peer);
            let mut packet = peer_packet(&from);
            fire_packet(callback, node, EV_K_DISCONNECTED, &mut packet);
        }
        SimCommand::Received { peer, cmd, data } => {
            let from = c_string(peer);
            let mut body = data.clone();
            let mut packet = peer_packet(&from);
            packet.cmd = *cmd;
            packet.data = body.as_mut_ptr() as *mut c_void;
            packet.data_len = body.len();
            // the native runtime reports a pointer-sized length here
            let len = std::mem::size_of::<*mut c_void>();
            fire(
                callback,
                node,
                EV_K_RECEIVED,
                &mut packet as *mut CorePacketData as *mut c_void,
                len,
            );
        }
        SimCommand::Shutdown { .. } => {}
    }
}

fn fire(callback: EventCallback, node: *mut c_void, tag: c_int, data: *mut c_void, len: usize) {
    unsafe { callback(node, tag, data, len, std::ptr::null_mut()) }
}

fn fire_packet(callback: EventCallback, node: *mut c_void, tag: c_int, packet: &mut CorePacketData) {
    fire(
        callback,
        node,
        tag,
        packet as *mut CorePacketData as *mut c_void,
        std::mem::size_of::<CorePacketData>(),
    );
}

fn peer_packet(from: &CString) -> CorePacketData {
    CorePacketData {
        from: from.as_ptr() as *mut c_char,
        from_len: u8::try_from(from.as_bytes_with_nul().len()).unwrap_or(u8::MAX),
        ..Default::default()
    }
}

// Scripted peer names come from tests; a NUL truncates them
fn c_string(value: &str) -> CString {
    let end = value.find('\0').unwrap_or(value.len());
    CString::new(&value[..end]).unwrap_or_default()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
