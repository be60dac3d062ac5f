//! Lifecycle events delivered by the runtime
//!
//! The runtime calls back with a numeric tag and an untyped payload. The tag
//! is decoded first and the payload is only read once the tag says what it
//! is. Everything a handler sees is copied out of the payload, which is only
//! valid for the duration of the callback.

use std::ffi::{c_char, c_int, c_void, CStr};
use thiserror::Error;

/// Raw event tags, in the runtime's declaration order
pub const EV_K_STARTED: c_int = 0;
pub const EV_K_CONNECTED: c_int = 1;
pub const EV_K_DISCONNECTED: c_int = 2;
pub const EV_K_RECEIVED: c_int = 3;
pub const EV_K_RECEIVED_WRONG: c_int = 4;
pub const EV_K_IDLE: c_int = 5;

/// Event kind decoded from a raw tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    PeerConnected,
    PeerDisconnected,
    Received,
    ReceivedWrong,
    Idle,
    Unknown(c_int),
}

impl EventKind {
    pub fn from_raw(tag: c_int) -> Self {
        match tag {
            EV_K_STARTED => EventKind::Started,
            EV_K_CONNECTED => EventKind::PeerConnected,
            EV_K_DISCONNECTED => EventKind::PeerDisconnected,
            EV_K_RECEIVED => EventKind::Received,
            EV_K_RECEIVED_WRONG => EventKind::ReceivedWrong,
            EV_K_IDLE => EventKind::Idle,
            other => EventKind::Unknown(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            EventKind::Started => EV_K_STARTED,
            EventKind::PeerConnected => EV_K_CONNECTED,
            EventKind::PeerDisconnected => EV_K_DISCONNECTED,
            EventKind::Received => EV_K_RECEIVED,
            EventKind::ReceivedWrong => EV_K_RECEIVED_WRONG,
            EventKind::Idle => EV_K_IDLE,
            EventKind::Unknown(tag) => tag,
        }
    }
}

/// Packet record the runtime attaches to peer events
///
/// Layout matches the runtime's `ksnCorePacketData`.
#[repr(C)]
#[derive(Debug)]
pub struct CorePacketData {
    pub addr: *mut c_char,
    pub port: c_int,
    pub mtu: c_int,
    pub from: *mut c_char,
    pub from_len: u8,
    pub cmd: u8,
    pub data: *mut c_void,
    pub data_len: usize,
    pub raw_data: *mut c_void,
    pub raw_data_len: usize,
    pub arp: *mut c_void,
}

impl Default for CorePacketData {
    fn default() -> Self {
        Self {
            addr: std::ptr::null_mut(),
            port: 0,
            mtu: 0,
            from: std::ptr::null_mut(),
            from_len: 0,
            cmd: 0,
            data: std::ptr::null_mut(),
            data_len: 0,
            raw_data: std::ptr::null_mut(),
            raw_data_len: 0,
            arp: std::ptr::null_mut(),
        }
    }
}

/// Peer named by a connect/disconnect/receive event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    /// Peer name (`from` in the packet record)
    pub from: String,
    pub addr: Option<String>,
    pub port: Option<u16>,
}

impl PeerDescriptor {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            addr: None,
            port: None,
        }
    }
}

/// Data received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPacket {
    pub peer: PeerDescriptor,
    pub cmd: u8,
    pub data: Vec<u8>,
}

/// Decoded lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    PeerConnected(PeerDescriptor),
    PeerDisconnected(PeerDescriptor),
    DataReceived(PeerPacket),
    Idle,
    /// Known or unknown kind the host does not act on
    Ignored(EventKind),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Started => EventKind::Started,
            LifecycleEvent::PeerConnected(_) => EventKind::PeerConnected,
            LifecycleEvent::PeerDisconnected(_) => EventKind::PeerDisconnected,
            LifecycleEvent::DataReceived(_) => EventKind::Received,
            LifecycleEvent::Idle => EventKind::Idle,
            LifecycleEvent::Ignored(kind) => *kind,
        }
    }

    /// Decode a raw callback invocation
    ///
    /// `data_len` is not trusted: the runtime reports it inconsistently for
    /// some events, so only the pointer itself is validated.
    ///
    /// # Safety
    ///
    /// For peer events `data` must be null or point to a [`CorePacketData`]
    /// whose string and data pointers are valid for the duration of the call.
    pub unsafe fn decode(
        tag: c_int,
        data: *const c_void,
        _data_len: usize,
    ) -> Result<Self, PayloadError> {
        let event = match EventKind::from_raw(tag) {
            EventKind::Started => LifecycleEvent::Started,
            EventKind::Idle => LifecycleEvent::Idle,
            EventKind::PeerConnected => {
                LifecycleEvent::PeerConnected(decode_peer(packet_ref(data)?)?)
            }
            EventKind::PeerDisconnected => {
                LifecycleEvent::PeerDisconnected(decode_peer(packet_ref(data)?)?)
            }
            EventKind::Received => LifecycleEvent::DataReceived(decode_packet(packet_ref(data)?)?),
            kind @ (EventKind::ReceivedWrong | EventKind::Unknown(_)) => {
                LifecycleEvent::Ignored(kind)
            }
        };
        Ok(event)
    }
}

/// Reasons a payload could not be decoded
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload pointer is null")]
    Null,
    #[error("packet record has no peer name")]
    MissingPeerName,
    #[error("packet data pointer is null but data_len is {0}")]
    MissingData(usize),
}

unsafe fn packet_ref<'a>(data: *const c_void) -> Result<&'a CorePacketData, PayloadError> {
    (data as *const CorePacketData)
        .as_ref()
        .ok_or(PayloadError::Null)
}

unsafe fn opt_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

unsafe fn decode_peer(packet: &CorePacketData) -> Result<PeerDescriptor, PayloadError> {
    let from = opt_string(packet.from).ok_or(PayloadError::MissingPeerName)?;
    let addr = opt_string(packet.addr).filter(|a| !a.is_empty());
    let port = u16::try_from(packet.port).ok().filter(|p| *p != 0);
    Ok(PeerDescriptor { from, addr, port })
}

unsafe fn decode_packet(packet: &CorePacketData) -> Result<PeerPacket, PayloadError> {
    let peer = decode_peer(packet)?;
    let data = if packet.data_len == 0 {
        Vec::new()
    } else if packet.data.is_null() {
        return Err(PayloadError::MissingData(packet.data_len));
    } else {
        std::slice::from_raw_parts(packet.data as *const u8, packet.data_len).to_vec()
    };
    Ok(PeerPacket {
        peer,
        cmd: packet.cmd,
        data,
    })
}
