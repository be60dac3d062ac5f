//! Shared helpers for teo_host integration tests

use anyhow::Result;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use teo_host::{LifecycleHandler, PeerDescriptor, PeerPacket};

/// Handler that records every call as a short string
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    changed: Condvar,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `count` calls were recorded
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let calls = self.calls.lock().unwrap();
        let (calls, _) = self
            .changed
            .wait_timeout_while(calls, timeout, |calls| calls.len() < count)
            .unwrap();
        calls.len() >= count
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        self.changed.notify_all();
    }
}

impl LifecycleHandler for RecordingHandler {
    fn on_started(&self) -> Result<()> {
        self.push("started".to_string());
        Ok(())
    }

    fn on_peer_connected(&self, peer: &PeerDescriptor) -> Result<()> {
        self.push(format!("connected:{}", peer.from));
        Ok(())
    }

    fn on_peer_disconnected(&self, peer: &PeerDescriptor) -> Result<()> {
        self.push(format!("disconnected:{}", peer.from));
        Ok(())
    }

    fn on_data_received(&self, packet: &PeerPacket) -> Result<()> {
        self.push(format!(
            "received:{}:{}:{}",
            packet.peer.from,
            packet.cmd,
            String::from_utf8_lossy(&packet.data)
        ));
        Ok(())
    }

    fn on_idle(&self) -> Result<()> {
        self.push("idle".to_string());
        Ok(())
    }
}

/// Route `log` output through the test harness
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
