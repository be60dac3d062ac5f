//! Allocation accounting for the argument vector
//!
//! Runs in its own test binary because it installs a global allocator. The
//! counter is per thread, so tests running in parallel do not disturb each
//! other.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::Arc;
use teo_host::testing::SimulatedRuntime;
use teo_host::{ArgumentVector, HostError, InitFlags, LifecycleHandler, NodeHost};

struct CountingAlloc;

thread_local! {
    static NET_BYTES: Cell<isize> = const { Cell::new(0) };
}

fn track(delta: isize) {
    let _ = NET_BYTES.try_with(|net| net.set(net.get() + delta));
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            track(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        track(-(layout.size() as isize));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            track(new_size as isize - layout.size() as isize);
        }
        new_ptr
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

fn net_bytes() -> isize {
    NET_BYTES.with(Cell::get)
}

/// Net bytes still allocated after `f` returns
fn leaked_by<F: FnMut()>(mut f: F) -> isize {
    // warm up one-time lazy allocations outside the measured window
    f();
    let before = net_bytes();
    f();
    net_bytes() - before
}

struct NoopHandler;

impl LifecycleHandler for NoopHandler {}

#[test]
fn build_and_release_leaves_nothing_behind() {
    let leaked = leaked_by(|| {
        let argv = ArgumentVector::from_args(["prog", "-a", "10.0.0.1"]).unwrap();
        assert_eq!(argv.len(), 3);
        argv.release();
    });
    assert_eq!(leaked, 0);
}

#[test]
fn drop_releases_like_release() {
    let leaked = leaked_by(|| {
        let argv = ArgumentVector::from_args(["prog", "node-1", "--port", "9010"]).unwrap();
        assert_eq!(argv.argc(), 4);
    });
    assert_eq!(leaked, 0);
}

#[test]
fn rejected_input_leaves_nothing_behind() {
    let leaked = leaked_by(|| {
        let err = ArgumentVector::from_args(["prog", "long-enough-to-allocate", "bad\0"]);
        assert!(err.is_err());
    });
    assert_eq!(leaked, 0);
}

#[test]
fn failed_initialization_releases_the_vector() {
    let leaked = leaked_by(|| {
        let argv = ArgumentVector::from_args(["prog", "-a", "10.0.0.1"]).unwrap();
        let mut host = NodeHost::new(SimulatedRuntime::failing("no network"));
        let err = host
            .init(argv, Arc::new(NoopHandler), InitFlags::READ_ALL)
            .unwrap_err();
        assert!(matches!(err, HostError::InitializationFailure { .. }));
        assert!(host.handle().is_none());
    });
    assert_eq!(leaked, 0);
}
