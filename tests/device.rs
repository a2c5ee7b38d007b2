mod common;

use std::sync::Arc;

use dpylease::device::Device;
use dpylease::error::ErrorKind;
use dpylease::handle::RawHandle;
use dpylease::lock::{NullToolkitLock, RecursiveToolkitLock, ToolkitLock};

use common::{registry, CountingToolkit};

#[test]
fn open_is_idempotent() {
    let (backend, registry) = registry();
    let device = common::device(&registry, "display:0");

    assert!(device.open().unwrap());
    let handle = device.raw_handle();
    assert!(!handle.is_null());

    // A second open performs no native acquire.
    assert!(!device.open().unwrap());
    assert_eq!(device.raw_handle(), handle);
    assert_eq!(backend.opens_of("display:0"), 1);

    assert!(device.close().unwrap());
}

#[test]
fn close_is_idempotent() {
    let (backend, registry) = registry();
    let device = common::device(&registry, "display:0");

    // Closing an unopened device is a no-op.
    assert!(!device.close().unwrap());

    device.open().unwrap();
    let handle = device.raw_handle();

    assert!(device.close().unwrap());
    assert!(device.raw_handle().is_null());
    assert!(backend.was_closed(handle));

    assert!(!device.close().unwrap());
    assert_eq!(backend.closed_handles(), vec![handle]);
}

#[test]
fn reopen_after_close_leases_again() {
    let (backend, registry) = registry();
    let device = common::device(&registry, "display:0");

    device.open().unwrap();
    let first = device.raw_handle();
    device.close().unwrap();

    assert!(device.open().unwrap());
    let second = device.raw_handle();
    assert!(!second.is_null());
    assert_ne!(first, second);
    assert_eq!(backend.opens_of("display:0"), 2);

    device.close().unwrap();
}

#[test]
fn borrowed_device_never_opens_or_closes() {
    let (backend, registry) = registry();
    let foreign = RawHandle::from_raw(0x7777);
    let device = Device::from_raw(
        registry.clone(),
        Some("display:0"),
        0,
        foreign,
        Arc::new(NullToolkitLock),
    );

    assert!(!device.is_handle_owner());
    assert!(!device.open().unwrap());
    assert!(!device.close().unwrap());

    assert_eq!(device.raw_handle(), foreign);
    assert_eq!(backend.open_count(), 0);
    assert!(backend.closed_handles().is_empty());
}

#[test]
fn clear_owner_is_permanent() {
    let (backend, registry) = registry();
    let device = common::device(&registry, "display:0");

    device.open().unwrap();
    let handle = device.raw_handle();

    // Hand the handle off: this instance must never close it now.
    device.clear_owner();
    assert!(!device.is_handle_owner());
    assert!(!device.close().unwrap());
    assert!(!backend.was_closed(handle));
    assert_eq!(registry.open_connection_count(), 1);

    // The new owner releases the lease through the registry.
    registry.release_by_handle(handle).unwrap();
    assert!(backend.was_closed(handle));
}

#[test]
fn open_propagates_backend_failure() {
    let (backend, registry) = registry();
    backend.fail_name("display:0");
    let device = common::device(&registry, "display:0");

    let err = device.open().unwrap_err();
    assert_eq!(err.error_kind(), ErrorKind::OpenFailed);
    assert_eq!(err.connection(), Some("display:0"));
    assert!(device.raw_handle().is_null());
}

#[test]
fn default_connection_device() {
    let (_backend, registry) = registry();
    let device = Device::new(registry.clone(), None, 0, Arc::new(NullToolkitLock));

    assert_eq!(device.connection_name(), None);
    device.open().unwrap();
    assert!(!device.raw_handle().is_null());
    assert_eq!(registry.snapshot()[0].name, registry.default_connection_name());

    device.close().unwrap();
}

#[test]
fn native_handle_returns_open_handle() {
    let (_backend, registry) = registry();
    let device = common::device(&registry, "display:0");

    device.open().unwrap();
    assert_eq!(device.native_handle(), device.raw_handle());
    device.close().unwrap();
}

#[test]
#[should_panic(expected = "no native handle")]
fn native_handle_of_unopened_device_is_fatal() {
    let (_backend, registry) = registry();
    let device = common::device(&registry, "display:0");

    let _ = device.native_handle();
}

#[test]
fn device_composes_a_toolkit_lock() {
    let (_backend, registry) = registry();
    let toolkit = Arc::new(CountingToolkit::new());
    let device = Device::new(
        registry,
        Some("display:0"),
        0,
        Arc::new(RecursiveToolkitLock::new(toolkit.clone())),
    );

    {
        let _guard = device.lock_guard();
        assert!(device.toolkit_lock().is_locked_by_current_thread());

        // Re-entering through the explicit calls nests on the same lock.
        device.lock();
        device.unlock();
    }

    assert!(!device.toolkit_lock().is_locked_by_current_thread());
    assert_eq!(toolkit.native_locks(), 1);
    assert_eq!(toolkit.native_unlocks(), 1);
}

#[test]
fn units_share_one_connection_per_lease() {
    let (backend, registry) = registry();
    let first = Device::new(registry.clone(), Some("display:0"), 0, Arc::new(NullToolkitLock));
    let second = Device::new(registry.clone(), Some("display:0"), 1, Arc::new(NullToolkitLock));

    first.open().unwrap();
    second.open().unwrap();
    assert_eq!(first.unit(), 0);
    assert_eq!(second.unit(), 1);

    // Both devices lease the same per-thread connection.
    let handle = first.raw_handle();
    assert_eq!(second.raw_handle(), handle);
    assert_eq!(backend.opens_of("display:0"), 1);
    assert_eq!(registry.snapshot()[0].refs, 2);

    first.close().unwrap();
    assert!(!backend.was_closed(handle));
    second.close().unwrap();
    assert!(backend.was_closed(handle));
}
