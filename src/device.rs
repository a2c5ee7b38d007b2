//! Graphics devices over leased display connections.
//!
//! A [`Device`] stands for one display/adapter: a connection name, a unit
//! id distinguishing logical devices on the same connection, the native
//! handle once opened, and the [`ToolkitLock`] every native call on this
//! device must hold.
//!
//! Ownership is explicit. A device constructed with [`Device::new`] owns
//! its handle: `open` leases it from the registry and `close` releases it.
//! A device wrapping a foreign handle via [`Device::from_raw`] never
//! closes it, and [`Device::clear_owner`] permanently demotes an owning
//! device when its handle is handed off to another owner, preventing a
//! double close.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{current_thread_name, Result};
use crate::handle::RawHandle;
use crate::lock::{ToolkitLock, ToolkitLockGuard};
use crate::registry::ConnectionRegistry;

#[derive(Debug, Clone, Copy)]
struct DeviceState {
    handle: RawHandle,
    owner: bool,
}

/// One display/adapter bound to a named connection.
///
/// Devices are shared behind an [`Arc`] with the surfaces created on them;
/// the mutable open/close state sits behind an internal mutex.
pub struct Device {
    registry: Arc<ConnectionRegistry>,
    connection: Option<String>,
    unit: u32,
    lock: Arc<dyn ToolkitLock>,
    state: Mutex<DeviceState>,
}

impl Device {
    /// Create an unopened device owning its future handle.
    ///
    /// `connection` of `None` binds to the registry's default connection.
    /// Call [`open`] before using the device for native calls; opening is
    /// deliberately deferred so devices can be constructed cheaply up
    /// front.
    ///
    /// [`open`]: Device::open
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        connection: Option<&str>,
        unit: u32,
        lock: Arc<dyn ToolkitLock>,
    ) -> Self {
        Self {
            registry,
            connection: connection.map(str::to_owned),
            unit,
            lock,
            state: Mutex::new(DeviceState { handle: RawHandle::NULL, owner: true }),
        }
    }

    /// Wrap an externally owned handle.
    ///
    /// The device starts in the borrowed state: [`open`] and [`close`] are
    /// no-ops, and whoever produced `handle` stays responsible for closing
    /// it.
    ///
    /// [`open`]: Device::open
    /// [`close`]: Device::close
    pub fn from_raw(
        registry: Arc<ConnectionRegistry>,
        connection: Option<&str>,
        unit: u32,
        handle: RawHandle,
        lock: Arc<dyn ToolkitLock>,
    ) -> Self {
        Self {
            registry,
            connection: connection.map(str::to_owned),
            unit,
            lock,
            state: Mutex::new(DeviceState { handle, owner: false }),
        }
    }

    /// Lease the connection and materialize the handle.
    ///
    /// Idempotent: returns `false` without a native acquire when the
    /// device is not the handle owner or is already open. Must run on the
    /// thread that will also [`close`] the device, since connection leases
    /// are per thread.
    ///
    /// [`close`]: Device::close
    pub fn open(&self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if !state.owner || !state.handle.is_null() {
            return Ok(false);
        }

        state.handle = self.registry.acquire(self.connection.as_deref())?;
        Ok(true)
    }

    /// Release the leased connection.
    ///
    /// Idempotent: returns `false` when the device is not the handle owner
    /// or is already closed. Reopening afterwards is allowed.
    pub fn close(&self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if !state.owner || state.handle.is_null() {
            return Ok(false);
        }

        self.registry.release_by_handle(state.handle)?;
        state.handle = RawHandle::NULL;
        Ok(true)
    }

    /// Permanently give up ownership of the handle.
    ///
    /// After this call [`close`] is a no-op forever on this instance, even
    /// while it still carries a nonzero handle. Used when the handle is
    /// handed off to another [`Device`] that becomes responsible for
    /// closing it.
    ///
    /// [`close`]: Device::close
    pub fn clear_owner(&self) {
        self.state.lock().unwrap().owner = false;
    }

    /// Whether this instance is responsible for closing the handle.
    pub fn is_handle_owner(&self) -> bool {
        self.state.lock().unwrap().owner
    }

    /// The native handle, [`RawHandle::NULL`] while unopened.
    pub fn raw_handle(&self) -> RawHandle {
        self.state.lock().unwrap().handle
    }

    /// The native handle, for use in a native call.
    ///
    /// # Panics
    ///
    /// Panics when the device holds no handle. Dereferencing a borrowed,
    /// unopened device is a programming error and fails fast here rather
    /// than handing the null handle to the toolkit.
    pub fn native_handle(&self) -> RawHandle {
        let state = self.state.lock().unwrap();
        if state.handle.is_null() {
            panic!(
                "device has no native handle: connection `{}` unit {} (owner: {}, thread `{}`)",
                self.connection.as_deref().unwrap_or("<default>"),
                self.unit,
                state.owner,
                current_thread_name(),
            );
        }
        state.handle
    }

    /// The connection name this device binds to, `None` for the default.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// The unit id distinguishing logical devices on one connection.
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// The registry this device leases its connection from.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The toolkit lock guarding native calls on this device.
    pub fn toolkit_lock(&self) -> &dyn ToolkitLock {
        self.lock.as_ref()
    }

    /// Acquire the device's toolkit lock.
    pub fn lock(&self) {
        self.lock.lock();
    }

    /// Release one level of the device's toolkit lock.
    pub fn unlock(&self) {
        self.lock.unlock();
    }

    /// Acquire the device's toolkit lock for the current scope.
    pub fn lock_guard(&self) -> ToolkitLockGuard<'_> {
        ToolkitLockGuard::new(self.lock.as_ref())
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Device")
            .field("connection", &self.connection)
            .field("unit", &self.unit)
            .field("handle", &state.handle)
            .field("owner", &state.owner)
            .finish()
    }
}
