//! The purpose of this library is to manage the lifecycle of native display
//! connections shared between application code and a windowing toolkit that
//! is not thread-safe. It provides a [`ConnectionRegistry`] leasing
//! reference-counted connections per thread, a [`Device`] wrapping one
//! connection with explicit open/close ownership, a recursive
//! [`ToolkitLock`] guarding every native toolkit call, and a
//! [`ProxySurface`] for lazily created dummy windows.
//!
//! The platform itself stays behind the traits in [`backend`]: a
//! [`DisplayBackend`] opens and closes connections (think `XOpenDisplay` /
//! `XCloseDisplay`), a [`ToolkitBackend`] exposes the toolkit's
//! non-reentrant lock primitives, and an [`UpstreamSurfaceHook`] creates
//! and destroys native windows on demand. Everything above those traits is
//! platform independent.
//!
//! The usual flow: construct a [`ConnectionRegistry`] over your platform's
//! [`DisplayBackend`], hand it to one [`Device`] per display/adapter, and
//! call [`Device::open`] before first use. Acquiring the same connection
//! name again on the same thread bumps a reference count and returns the
//! same handle; the native connection is closed exactly when the last
//! lease on that thread is released. Before touching the toolkit, take the
//! device's [`ToolkitLock`] — it nests freely on the owning thread and
//! only the outermost acquisition reaches the native primitive.
//!
//! [`ConnectionRegistry`]: crate::registry::ConnectionRegistry
//! [`Device`]: crate::device::Device
//! [`Device::open`]: crate::device::Device::open()
//! [`ToolkitLock`]: crate::lock::ToolkitLock
//! [`ProxySurface`]: crate::surface::ProxySurface
//! [`backend`]: crate::backend
//! [`DisplayBackend`]: crate::backend::DisplayBackend
//! [`ToolkitBackend`]: crate::backend::ToolkitBackend
//! [`UpstreamSurfaceHook`]: crate::backend::UpstreamSurfaceHook

#![deny(
    missing_debug_implementations,
    //missing_docs,
)]

pub mod backend;
pub mod device;
pub mod error;
pub mod handle;
pub mod lock;
pub mod prelude;
pub mod registry;
pub mod surface;
