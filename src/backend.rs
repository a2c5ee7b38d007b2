//! Native collaborator traits.
//!
//! The platform side of the crate lives behind these traits. Real
//! implementations bind them to X11, EGL, or whatever toolkit is in use;
//! tests substitute in-memory fakes. Nothing in this crate calls the
//! platform except through them.

use std::fmt;
use std::sync::Arc;

use crate::device::Device;
use crate::handle::RawHandle;

/// Opens and closes native display connections.
///
/// The registry serializes nothing around these calls: `open` and `close`
/// run without any registry lock held and must perform their own internal
/// thread-safety, like `XOpenDisplay` does.
pub trait DisplayBackend: Send + Sync + fmt::Debug {
    /// Open a connection to the named display.
    ///
    /// `None` requests the platform default connection. Returns
    /// [`RawHandle::NULL`] when the connection cannot be established.
    fn open(&self, name: Option<&str>) -> RawHandle;

    /// Close a previously opened connection.
    ///
    /// Called at most once per successful [`open`], and never for a
    /// connection that was marked uncloseable.
    ///
    /// [`open`]: DisplayBackend::open
    fn close(&self, handle: RawHandle);

    /// The canonical name of an open connection, like `XDisplayString`.
    ///
    /// Used once per registry to discover the default connection name.
    fn query_name(&self, handle: RawHandle) -> Option<String>;
}

/// The native toolkit's global lock primitives.
///
/// These are assumed non-reentrant; [`RecursiveToolkitLock`] guarantees
/// they are invoked only on the outermost lock transition of a thread.
///
/// [`RecursiveToolkitLock`]: crate::lock::RecursiveToolkitLock
pub trait ToolkitBackend: Send + Sync + fmt::Debug {
    /// Take the toolkit's global lock.
    fn lock_toolkit(&self);

    /// Release the toolkit's global lock.
    fn unlock_toolkit(&self);
}

/// Creates and destroys the native window backing a proxy surface.
///
/// Supplied per use site, e.g. a hook producing a hidden 1x1 window for
/// headless contexts.
pub trait UpstreamSurfaceHook: Send + fmt::Debug {
    /// Create the upstream native window for `device`.
    ///
    /// Returns [`RawHandle::NULL`] on failure.
    fn create(&self, device: &Device) -> RawHandle;

    /// Destroy an upstream window previously returned by [`create`].
    ///
    /// Only ever called for windows this hook created.
    ///
    /// [`create`]: UpstreamSurfaceHook::create
    fn destroy(&self, device: &Device, handle: RawHandle);
}

impl<T: UpstreamSurfaceHook + Send + Sync + ?Sized> UpstreamSurfaceHook for Arc<T> {
    fn create(&self, device: &Device) -> RawHandle {
        (**self).create(device)
    }

    fn destroy(&self, device: &Device, handle: RawHandle) {
        (**self).destroy(device, handle)
    }
}
