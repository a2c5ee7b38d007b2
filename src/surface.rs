//! Proxy surfaces with deferred creation and explicit upstream ownership.
//!
//! A [`ProxySurface`] wraps the native window a rendering surface is bound
//! to. The same type covers two cases: wrapping a caller-supplied existing
//! window, which the proxy must never destroy, and lazily creating a dummy
//! window through an [`UpstreamSurfaceHook`], which the proxy owns and
//! tears down again. Which case applies is carried by the backing variant
//! (owned vs borrowed), decided at creation time, not by the surface's
//! type.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::backend::UpstreamSurfaceHook;
use crate::device::Device;
use crate::error::{Error, ErrorKind, Result};
use crate::handle::RawHandle;

bitflags! {
    /// Option bits describing a proxy surface's upstream window.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SurfaceOptions: u32 {
        /// This proxy created the upstream window and will destroy it.
        const OWNS_UPSTREAM_SURFACE = 0b0000_0001;

        /// The upstream window is a hidden dummy surface.
        const UPSTREAM_WINDOW_INVISIBLE = 0b0000_0010;
    }
}

/// The native window behind a proxy surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    /// Created by this proxy, destroyed by this proxy.
    Owned(RawHandle),

    /// Supplied by the caller, never destroyed by this proxy.
    Borrowed(RawHandle),
}

impl Backing {
    fn handle(self) -> RawHandle {
        match self {
            Backing::Owned(handle) | Backing::Borrowed(handle) => handle,
        }
    }
}

/// A surface wrapper that may or may not own its native window.
///
/// With ownership encoded in the backing variant, the corrupt state the
/// bookkeeping otherwise has to police, owning a window while holding no
/// handle, cannot be constructed.
pub struct ProxySurface {
    device: Arc<Device>,
    hook: Box<dyn UpstreamSurfaceHook>,
    backing: Option<Backing>,
    options: SurfaceOptions,
}

impl ProxySurface {
    /// A surface with no upstream window yet.
    ///
    /// The window is materialized through `hook` by [`create`] or on the
    /// first [`lock_surface`].
    ///
    /// [`create`]: ProxySurface::create
    /// [`lock_surface`]: ProxySurface::lock_surface
    pub fn new(device: Arc<Device>, hook: Box<dyn UpstreamSurfaceHook>) -> Self {
        Self { device, hook, backing: None, options: SurfaceOptions::empty() }
    }

    /// A surface wrapping the caller's existing native window.
    ///
    /// The window stays the caller's responsibility; [`destroy`] never
    /// touches it.
    ///
    /// [`destroy`]: ProxySurface::destroy
    pub fn from_existing(
        device: Arc<Device>,
        hook: Box<dyn UpstreamSurfaceHook>,
        handle: RawHandle,
    ) -> Result<Self> {
        if handle.is_null() {
            return Err(Error::new(ErrorKind::InvalidHandle));
        }

        Ok(Self {
            device,
            hook,
            backing: Some(Backing::Borrowed(handle)),
            options: SurfaceOptions::empty(),
        })
    }

    /// Materialize the upstream window if there is none yet.
    ///
    /// Returns whether this call performed the materialization. A freshly
    /// created dummy window is marked invisible by convention.
    pub fn create(&mut self) -> Result<bool> {
        if self.backing.is_some() {
            return Ok(false);
        }

        let handle = self.hook.create(&self.device);
        if handle.is_null() {
            return Err(Error::new(ErrorKind::SurfaceCreationFailed));
        }

        self.backing = Some(Backing::Owned(handle));
        self.options |= SurfaceOptions::UPSTREAM_WINDOW_INVISIBLE;
        Ok(true)
    }

    /// Tear down the upstream window if this proxy owns it.
    ///
    /// A borrowed window is left untouched and the surface stays usable; a
    /// missing backing makes this a no-op.
    pub fn destroy(&mut self) {
        if let Some(Backing::Owned(handle)) = self.backing {
            self.hook.destroy(&self.device, handle);
            self.backing = None;
            self.options.remove(SurfaceOptions::UPSTREAM_WINDOW_INVISIBLE);
        }
    }

    /// Take the device's toolkit lock and make sure the surface is backed.
    ///
    /// The upstream window is created on the first lock of a deferred
    /// surface. Returns whether this call materialized it. On a creation
    /// failure the lock is released again before the error propagates.
    pub fn lock_surface(&mut self) -> Result<bool> {
        self.device.lock();
        match self.create() {
            Ok(created) => Ok(created),
            Err(err) => {
                self.device.unlock();
                Err(err)
            },
        }
    }

    /// Release the device's toolkit lock taken by [`lock_surface`].
    ///
    /// [`lock_surface`]: ProxySurface::lock_surface
    pub fn unlock_surface(&mut self) {
        self.device.unlock();
    }

    /// The native handle of the upstream window, [`RawHandle::NULL`] while
    /// not materialized.
    pub fn surface_handle(&self) -> RawHandle {
        self.backing.map(Backing::handle).unwrap_or(RawHandle::NULL)
    }

    /// Whether this proxy owns (and will destroy) its upstream window.
    pub fn owns_upstream_surface(&self) -> bool {
        matches!(self.backing, Some(Backing::Owned(_)))
    }

    /// The surface's option bits.
    ///
    /// [`SurfaceOptions::OWNS_UPSTREAM_SURFACE`] reflects the current
    /// backing.
    pub fn options(&self) -> SurfaceOptions {
        let mut options = self.options;
        options.set(SurfaceOptions::OWNS_UPSTREAM_SURFACE, self.owns_upstream_surface());
        options
    }

    /// The device this surface was created on.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl fmt::Debug for ProxySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySurface")
            .field("device", &self.device)
            .field("handle", &self.surface_handle())
            .field("options", &self.options())
            .finish()
    }
}
