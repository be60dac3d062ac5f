//! Boundary with the node runtime
//!
//! The runtime is an external collaborator. [`NodeRuntime`] is the narrow
//! interface the host consumes: initialize with an argument vector and the
//! event callback, attach identity strings, then hand over the calling thread
//! to the blocking run loop.

use crate::argv::ArgumentVector;
use crate::callbacks::EventCallback;
use crate::config::InitFlags;
use crate::error::{HostError, Result};
use std::ffi::{c_void, CStr};
use std::ptr::NonNull;

/// Opaque node handle returned by runtime initialization
///
/// The host never looks behind the pointer; it only passes the handle back to
/// the runtime and uses it to find the node's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(NonNull<c_void>);

// SAFETY: the handle is an opaque token; the host never dereferences it.
unsafe impl Send for NodeHandle {}
unsafe impl Sync for NodeHandle {}

impl NodeHandle {
    /// Wrap a raw runtime pointer, rejecting null
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(NodeHandle)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    pub(crate) fn key(self) -> usize {
        self.0.as_ptr() as usize
    }
}

/// Operations the host needs from the node runtime
pub trait NodeRuntime {
    /// Initialize a node
    ///
    /// The runtime reads `argv` during this call only. `callback` is invoked
    /// for every lifecycle event from the runtime's event thread.
    fn init(
        &self,
        argv: &mut ArgumentVector,
        callback: EventCallback,
        flags: InitFlags,
    ) -> Result<NodeHandle>;

    /// Advertise the application type of this node
    fn set_application_type(&self, handle: NodeHandle, app_type: &CStr) -> Result<()>;

    /// Advertise the application version of this node
    fn set_application_version(&self, handle: NodeHandle, version: &CStr) -> Result<()>;

    /// Block until the runtime terminates, returning its exit status
    fn run(&self, handle: NodeHandle) -> Result<i32>;

    /// Ask a running node to stop, if the runtime supports it
    fn stop(&self, _handle: NodeHandle) -> Result<()> {
        Err(HostError::Runtime {
            message: "runtime exposes no shutdown primitive".to_string(),
        })
    }
}

/// Bindings to libteonet
#[cfg(feature = "native")]
pub mod native {
    use super::*;
    use std::ffi::{c_char, c_int};

    #[link(name = "teonet")]
    extern "C" {
        fn ksnetEvMgrInit(
            argc: c_int,
            argv: *mut *mut c_char,
            event_cb: Option<EventCallback>,
            options: c_int,
        ) -> *mut c_void;
        fn teoSetAppType(ke: *mut c_void, app_type: *const c_char);
        fn teoSetAppVersion(ke: *mut c_void, app_version: *const c_char);
        fn ksnetEvMgrRun(ke: *mut c_void) -> c_int;
        fn ksnetEvMgrStop(ke: *mut c_void);
    }

    /// The real runtime
    ///
    /// Identity strings are borrowed, not copied, by the runtime: callers
    /// must keep them alive for the node's lifetime (`NodeHost` does).
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativeRuntime;

    impl NativeRuntime {
        pub fn new() -> Self {
            Self
        }
    }

    impl NodeRuntime for NativeRuntime {
        fn init(
            &self,
            argv: &mut ArgumentVector,
            callback: EventCallback,
            flags: InitFlags,
        ) -> Result<NodeHandle> {
            let raw = unsafe {
                ksnetEvMgrInit(argv.argc(), argv.as_mut_ptr(), Some(callback), flags.bits())
            };
            NodeHandle::from_raw(raw).ok_or_else(|| HostError::InitializationFailure {
                reason: "ksnetEvMgrInit returned a null handle".to_string(),
            })
        }

        fn set_application_type(&self, handle: NodeHandle, app_type: &CStr) -> Result<()> {
            unsafe { teoSetAppType(handle.as_ptr(), app_type.as_ptr()) };
            Ok(())
        }

        fn set_application_version(&self, handle: NodeHandle, version: &CStr) -> Result<()> {
            unsafe { teoSetAppVersion(handle.as_ptr(), version.as_ptr()) };
            Ok(())
        }

        fn run(&self, handle: NodeHandle) -> Result<i32> {
            Ok(unsafe { ksnetEvMgrRun(handle.as_ptr()) })
        }

        fn stop(&self, handle: NodeHandle) -> Result<()> {
            unsafe { ksnetEvMgrStop(handle.as_ptr()) };
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_rejected() {
        assert!(NodeHandle::from_raw(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn handle_keeps_pointer_identity() {
        let mut slot = 0u8;
        let ptr = &mut slot as *mut u8 as *mut c_void;
        let handle = NodeHandle::from_raw(ptr).unwrap();
        assert_eq!(handle.as_ptr(), ptr);
        assert_eq!(handle.key(), ptr as usize);
        assert_eq!(handle, NodeHandle::from_raw(ptr).unwrap());
    }
}
