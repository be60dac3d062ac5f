mod common;

use anyhow::{bail, Result};
use common::RecordingHandler;
use std::ffi::{c_char, c_int, c_void, CString};
use std::sync::Arc;
use teo_common::logging::{Component, Logger};
use teo_host::callbacks::{dispatcher_for, register_dispatcher, unregister_dispatcher};
use teo_host::events::{
    CorePacketData, EV_K_CONNECTED, EV_K_DISCONNECTED, EV_K_RECEIVED, EV_K_RECEIVED_WRONG,
    EV_K_STARTED,
};
use teo_host::{
    teo_event_dispatch, DispatchStats, EventDispatcher, LifecycleHandler, NodeHandle,
    PeerDescriptor,
};

/// A registry slot backed by a heap token, so every test gets its own key
struct FakeNode {
    _token: Box<u64>,
    handle: NodeHandle,
}

impl FakeNode {
    fn register(handler: Arc<dyn LifecycleHandler>) -> (Self, Arc<EventDispatcher>) {
        let mut token = Box::new(0u64);
        let handle = NodeHandle::from_raw(&mut *token as *mut u64 as *mut c_void).unwrap();
        let dispatcher = Arc::new(EventDispatcher::new(
            handler,
            Logger::new_root(Component::Host, "dispatch-test"),
        ));
        assert!(register_dispatcher(handle, Arc::clone(&dispatcher)).is_none());
        (
            Self {
                _token: token,
                handle,
            },
            dispatcher,
        )
    }

    fn raw(&self, tag: c_int) {
        unsafe {
            teo_event_dispatch(
                self.handle.as_ptr(),
                tag,
                std::ptr::null_mut(),
                0,
                std::ptr::null_mut(),
            )
        }
    }

    fn peer(&self, tag: c_int, name: &str) {
        let from = CString::new(name).unwrap();
        let mut packet = CorePacketData {
            from: from.as_ptr() as *mut c_char,
            from_len: from.as_bytes_with_nul().len() as u8,
            ..Default::default()
        };
        unsafe {
            teo_event_dispatch(
                self.handle.as_ptr(),
                tag,
                &mut packet as *mut CorePacketData as *mut c_void,
                std::mem::size_of::<CorePacketData>(),
                std::ptr::null_mut(),
            )
        }
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        unregister_dispatcher(self.handle);
    }
}

#[test]
fn connect_disconnect_sequence_is_delivered_in_order() {
    let recorder = RecordingHandler::new();
    let (node, dispatcher) = FakeNode::register(recorder.clone());

    node.raw(EV_K_STARTED);
    node.peer(EV_K_CONNECTED, "p1");
    node.peer(EV_K_CONNECTED, "p2");
    node.peer(EV_K_DISCONNECTED, "p1");
    node.peer(EV_K_DISCONNECTED, "p2");

    assert_eq!(
        recorder.calls(),
        vec![
            "started",
            "connected:p1",
            "connected:p2",
            "disconnected:p1",
            "disconnected:p2"
        ]
    );
    assert_eq!(dispatcher.stats().delivered, 5);
    assert!(dispatcher.connected_peers().is_empty());
}

#[test]
fn disconnect_never_precedes_connect() {
    let recorder = RecordingHandler::new();
    let (node, dispatcher) = FakeNode::register(recorder.clone());

    node.raw(EV_K_STARTED);
    node.peer(EV_K_DISCONNECTED, "p1");
    node.peer(EV_K_CONNECTED, "p1");
    node.peer(EV_K_CONNECTED, "p2");
    assert_eq!(dispatcher.connected_peers(), vec!["p1", "p2"]);
    node.peer(EV_K_DISCONNECTED, "p1");

    let calls = recorder.calls();
    assert_eq!(calls.first().map(String::as_str), Some("started"));
    for (i, call) in calls.iter().enumerate() {
        if let Some(peer) = call.strip_prefix("disconnected:") {
            let connect = format!("connected:{peer}");
            assert!(calls[..i].contains(&connect), "{call} before {connect}");
        }
    }
    assert_eq!(dispatcher.stats().dropped, 1);
}

#[test]
fn unknown_tags_have_no_side_effects() {
    let recorder = RecordingHandler::new();
    let (node, dispatcher) = FakeNode::register(recorder.clone());

    for tag in [EV_K_RECEIVED_WRONG, 6, 42, -1, c_int::MAX] {
        node.raw(tag);
    }

    assert!(recorder.calls().is_empty());
    assert!(!dispatcher.has_started());
    assert!(dispatcher.connected_peers().is_empty());
    assert_eq!(
        dispatcher.stats(),
        DispatchStats {
            ignored: 5,
            ..Default::default()
        }
    );
}

#[test]
fn bad_payloads_are_dropped() {
    let recorder = RecordingHandler::new();
    let (node, dispatcher) = FakeNode::register(recorder.clone());

    node.raw(EV_K_CONNECTED);
    node.raw(EV_K_RECEIVED);

    assert!(recorder.calls().is_empty());
    assert_eq!(dispatcher.stats().dropped, 2);
}

#[test]
fn unregistered_and_null_handles_are_ignored() {
    let mut slot = 0u8;
    unsafe {
        teo_event_dispatch(
            &mut slot as *mut u8 as *mut c_void,
            EV_K_STARTED,
            std::ptr::null_mut(),
            0,
            std::ptr::null_mut(),
        );
        teo_event_dispatch(
            std::ptr::null_mut(),
            EV_K_STARTED,
            std::ptr::null_mut(),
            0,
            std::ptr::null_mut(),
        );
    }
}

#[test]
fn unregister_stops_delivery() {
    let recorder = RecordingHandler::new();
    let (node, _dispatcher) = FakeNode::register(recorder.clone());
    assert!(dispatcher_for(node.handle).is_some());

    let removed = unregister_dispatcher(node.handle);
    assert!(removed.is_some());
    node.raw(EV_K_STARTED);
    assert!(recorder.calls().is_empty());
}

struct FailingHandler;

impl LifecycleHandler for FailingHandler {
    fn on_started(&self) -> Result<()> {
        bail!("handler refused to start")
    }

    fn on_peer_connected(&self, peer: &PeerDescriptor) -> Result<()> {
        panic!("handler blew up on {}", peer.from)
    }
}

#[test]
fn handler_errors_and_panics_are_contained() {
    common::init_logging();
    let (node, dispatcher) = FakeNode::register(Arc::new(FailingHandler));

    node.raw(EV_K_STARTED);
    node.peer(EV_K_CONNECTED, "p1");
    // state tracking continues past the failures
    node.peer(EV_K_DISCONNECTED, "p1");

    let stats = dispatcher.stats();
    assert_eq!(stats.handler_failures, 2);
    assert_eq!(stats.delivered, 1);
    assert!(dispatcher.has_started());
}
