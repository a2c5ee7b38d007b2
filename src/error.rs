//! Dpylease error handling.
//!
//! Only recoverable conditions are expressed as [`Error`] values. Internal
//! bookkeeping violations (refcount underflow, handle index mismatches,
//! unlocking a toolkit lock from a non-owning thread) are bugs, not
//! transient conditions, and panic with full identifying context instead.

use std::fmt;
use std::thread;

use crate::handle::RawHandle;

/// A specialized [`Result`] type for display lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for all the display lifecycle operations.
#[derive(Debug, Clone)]
pub struct Error {
    /// The connection name involved, in case it is known.
    connection: Option<String>,

    /// The native handle involved, in case it is known.
    handle: Option<RawHandle>,

    /// Name of the thread the operation ran on.
    thread: String,

    /// The simplified error kind to handle matching.
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { connection: None, handle: None, thread: current_thread_name(), kind }
    }

    pub(crate) fn with_connection(mut self, connection: &str) -> Self {
        self.connection = Some(connection.to_owned());
        self
    }

    pub(crate) fn with_handle(mut self, handle: RawHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Helper to check that error is [`ErrorKind::NotRegistered`].
    #[inline]
    pub fn not_registered(&self) -> bool {
        matches!(self.kind, ErrorKind::NotRegistered)
    }

    /// The underlying error kind.
    #[inline]
    pub fn error_kind(&self) -> ErrorKind {
        self.kind
    }

    /// The connection name the failing operation referred to, if any.
    #[inline]
    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// The native handle the failing operation referred to, if any.
    #[inline]
    pub fn handle(&self) -> Option<RawHandle> {
        self.handle
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;

        if let Some(connection) = self.connection.as_ref() {
            write!(f, ", connection `{connection}`")?;
        }

        if let Some(handle) = self.handle {
            write!(f, ", handle {handle}")?;
        }

        write!(f, ", thread `{}`", self.thread)
    }
}

impl std::error::Error for Error {}

/// Build an error with just a kind.
impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

/// A list specifying general categories of display lifecycle errors.
///
/// All of these are recoverable by the immediate caller; none is retried
/// internally.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ErrorKind {
    /// The native open primitive returned the null handle.
    OpenFailed,

    /// A release or tagging operation referred to a name or handle that is
    /// not registered on the calling thread.
    NotRegistered,

    /// A null handle was about to be used for a native call.
    InvalidHandle,

    /// The upstream surface hook failed to produce a native window.
    SurfaceCreationFailed,
}

impl ErrorKind {
    pub(crate) fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match *self {
            OpenFailed => "failed to open the native display connection",
            NotRegistered => "name or handle is not registered on this thread",
            InvalidHandle => "attempt to use a null native handle",
            SurfaceCreationFailed => "the upstream surface hook returned no surface",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn current_thread_name() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_owned(),
        None => format!("{:?}", current.id()),
    }
}
