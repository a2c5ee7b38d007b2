//! Opaque native resource handles.

use std::fmt;

/// An opaque, pointer sized value identifying a native resource, such as a
/// display connection, a window, or a device context.
///
/// The handle is pure identity: equality is by value and the zero value
/// stands for "no resource". Whoever hands a [`RawHandle`] around is
/// responsible for the lifetime of the resource behind it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(u64);

impl RawHandle {
    /// The reserved "no resource" value.
    pub const NULL: Self = Self(0);

    /// Wrap a raw native value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw native value.
    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved "no resource" value.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.0)
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for RawHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
