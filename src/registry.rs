//! Per-thread reference counting of named display connections.
//!
//! Every thread that acquires a connection name gets its own native
//! connection: entries are keyed by thread first, name second, so one
//! thread can never close a connection another thread is using. The price
//! is a duplicate native open when two threads ask for the same name,
//! which is deliberate. A process-wide handle index exists on the side so
//! subsystems holding only a raw handle can find and tag entries without
//! knowing which thread or name created them.
//!
//! The registry is an explicitly constructed object, not process-global
//! state, so tests can run isolated instances side by side. Embedders
//! usually hold exactly one in an `Arc` for the lifetime of the process
//! and call [`ConnectionRegistry::shutdown`] on the way out.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;

use crate::backend::DisplayBackend;
use crate::error::{current_thread_name, Error, ErrorKind, Result};
use crate::handle::RawHandle;

/// Connection name recorded when the platform default cannot be opened.
const FALLBACK_CONNECTION: &str = "default";

/// One leased native connection, owned by a single thread.
struct ConnectionEntry {
    name: String,
    handle: RawHandle,
    thread_name: String,
    /// Lease count. Mutated only by the owning thread, under the thread
    /// map mutex; atomic so diagnostics on other threads read a sane
    /// value.
    refs: AtomicU32,
    uncloseable: AtomicBool,
}

impl ConnectionEntry {
    fn refs(&self) -> u32 {
        self.refs.load(Ordering::Relaxed)
    }
}

/// An owned diagnostic copy of one registry entry.
///
/// Snapshots are detached from the live registry; they reflect the state
/// at the time of the [`ConnectionRegistry::snapshot`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Normalized connection name.
    pub name: String,

    /// The native handle of the connection.
    pub handle: RawHandle,

    /// Name of the thread owning the lease.
    pub thread_name: String,

    /// Outstanding lease count.
    pub refs: u32,

    /// Whether the native close has been suppressed for this entry.
    pub uncloseable: bool,
}

/// Leases reference-counted native display connections per thread.
///
/// Acquire and release are symmetric and name-based; release by handle is
/// a convenience going through the handle index. All four operations must
/// balance per thread: releasing more often than acquiring is reported as
/// [`ErrorKind::NotRegistered`], and any mismatch between the two internal
/// maps panics, since continuing would risk a double close or a
/// use-after-close of a native resource.
pub struct ConnectionRegistry {
    backend: Arc<dyn DisplayBackend>,

    /// Default connection name, discovered once per registry.
    default_name: OnceCell<String>,

    /// name -> entry, keyed by owning thread. Only the owning thread
    /// mutates its inner map; other threads read via [`Self::snapshot`].
    threads: Mutex<HashMap<ThreadId, HashMap<String, Arc<ConnectionEntry>>>>,

    /// handle -> entry, across all threads.
    ///
    /// Never locked while the thread map mutex is held, and vice versa.
    handles: Mutex<HashMap<RawHandle, Arc<ConnectionEntry>>>,
}

impl ConnectionRegistry {
    /// Create a registry over the given display backend.
    pub fn new(backend: Arc<dyn DisplayBackend>) -> Self {
        Self {
            backend,
            default_name: OnceCell::new(),
            threads: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The name `None` normalizes to on this registry.
    ///
    /// Discovered on first use by opening the platform default connection,
    /// recording its canonical name, and closing it again. When even that
    /// fails, a fixed fallback name is recorded so acquisition by explicit
    /// name keeps working on systems without a default display.
    pub fn default_connection_name(&self) -> &str {
        self.default_name.get_or_init(|| {
            let handle = self.backend.open(None);
            if handle.is_null() {
                log::warn!(
                    "default display connection could not be opened, \
                     recording `{FALLBACK_CONNECTION}` as the default name"
                );
                return FALLBACK_CONNECTION.to_owned();
            }

            let name = self
                .backend
                .query_name(handle)
                .unwrap_or_else(|| FALLBACK_CONNECTION.to_owned());
            self.backend.close(handle);
            name
        })
    }

    fn normalize<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        match name {
            Some(name) => name,
            None => self.default_connection_name(),
        }
    }

    /// Lease the named connection for the calling thread.
    ///
    /// The first acquire of a name on a thread opens a native connection;
    /// subsequent acquires of the same name on the same thread bump the
    /// lease count and return the same handle. Distinct threads acquiring
    /// the same name get distinct native connections.
    pub fn acquire(&self, name: Option<&str>) -> Result<RawHandle> {
        let name = self.normalize(name);
        let thread = thread::current().id();

        {
            let threads = self.threads.lock().unwrap();
            if let Some(entry) = threads.get(&thread).and_then(|names| names.get(name)) {
                entry.refs.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.handle);
            }
        }

        // No lease yet. The native open runs with no registry lock held;
        // only the calling thread could insert this entry, so there is no
        // race between the check above and the inserts below.
        let handle = self.backend.open(Some(name));
        if handle.is_null() {
            return Err(Error::new(ErrorKind::OpenFailed).with_connection(name));
        }

        let entry = Arc::new(ConnectionEntry {
            name: name.to_owned(),
            handle,
            thread_name: current_thread_name(),
            refs: AtomicU32::new(1),
            uncloseable: AtomicBool::new(false),
        });

        {
            let mut threads = self.threads.lock().unwrap();
            threads.entry(thread).or_default().insert(name.to_owned(), entry.clone());
        }

        let stale = self.handles.lock().unwrap().insert(handle, entry);
        if let Some(stale) = stale {
            panic!(
                "native open returned a handle that is already registered: handle {handle} \
                 is held by connection `{}` (refs {}, thread `{}`)",
                stale.name,
                stale.refs(),
                stale.thread_name,
            );
        }

        Ok(handle)
    }

    /// Release one lease of the named connection on the calling thread.
    ///
    /// When the last lease goes away the entry is removed from both maps
    /// and the native connection is closed, unless it was marked
    /// uncloseable. Returns the handle either way.
    pub fn release(&self, name: Option<&str>) -> Result<RawHandle> {
        let name = self.normalize(name);
        let thread = thread::current().id();

        let entry = {
            let mut threads = self.threads.lock().unwrap();

            let entry = match threads.get(&thread).and_then(|names| names.get(name)) {
                Some(entry) => entry.clone(),
                None => {
                    return Err(Error::new(ErrorKind::NotRegistered).with_connection(name));
                },
            };

            let refs = entry.refs();
            if refs == 0 {
                panic!(
                    "connection refcount underflow: `{name}` (handle {}, thread `{}`) is \
                     still mapped with zero leases",
                    entry.handle, entry.thread_name,
                );
            }

            entry.refs.store(refs - 1, Ordering::Relaxed);
            if refs > 1 {
                return Ok(entry.handle);
            }

            // Last lease: unmap on this thread, then fix the handle index
            // below, outside this critical section.
            let names = threads.get_mut(&thread).unwrap();
            names.remove(name);
            if names.is_empty() {
                threads.remove(&thread);
            }
            entry
        };

        match self.handles.lock().unwrap().remove(&entry.handle) {
            Some(indexed) if Arc::ptr_eq(&indexed, &entry) => {},
            Some(indexed) => panic!(
                "handle index out of sync: handle {} maps to connection `{}` on thread `{}`, \
                 expected `{}` on thread `{}`",
                entry.handle, indexed.name, indexed.thread_name, entry.name, entry.thread_name,
            ),
            None => panic!(
                "handle index out of sync: no entry for handle {} while releasing \
                 connection `{}` (thread `{}`)",
                entry.handle, entry.name, entry.thread_name,
            ),
        }

        if !entry.uncloseable.load(Ordering::Relaxed) {
            self.backend.close(entry.handle);
        }

        Ok(entry.handle)
    }

    /// Release one lease of the connection behind `handle`.
    ///
    /// Reverse-looks-up the owning entry and delegates to [`release`] by
    /// name. Since leases are per thread, releasing a handle owned by a
    /// different thread reports [`ErrorKind::NotRegistered`] rather than
    /// touching that thread's lease.
    ///
    /// [`release`]: ConnectionRegistry::release
    pub fn release_by_handle(&self, handle: RawHandle) -> Result<RawHandle> {
        if handle.is_null() {
            return Err(Error::new(ErrorKind::InvalidHandle));
        }

        let name = {
            let handles = self.handles.lock().unwrap();
            match handles.get(&handle) {
                Some(entry) => entry.name.clone(),
                None => {
                    return Err(Error::new(ErrorKind::NotRegistered).with_handle(handle));
                },
            }
        };

        self.release(Some(&name))
    }

    /// Suppress the native close for the connection behind `handle`.
    ///
    /// The entry still goes through normal refcounting and is removed from
    /// the bookkeeping when the last lease is released; only the native
    /// close call is skipped. Returns whether the handle was known. Callers
    /// use this opportunistically, so an unknown handle is not an error.
    pub fn mark_uncloseable(&self, handle: RawHandle) -> bool {
        let handles = self.handles.lock().unwrap();
        match handles.get(&handle) {
            Some(entry) => {
                entry.uncloseable.store(true, Ordering::Relaxed);
                true
            },
            None => false,
        }
    }

    /// Number of open connections across all threads.
    pub fn open_connection_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    /// An owned copy of all outstanding entries, for diagnostics.
    ///
    /// Never exposes the live maps; the result is stable and sorted by
    /// handle.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let handles = self.handles.lock().unwrap();
        let mut infos: Vec<_> = handles
            .values()
            .map(|entry| ConnectionInfo {
                name: entry.name.clone(),
                handle: entry.handle,
                thread_name: entry.thread_name.clone(),
                refs: entry.refs(),
                uncloseable: entry.uncloseable.load(Ordering::Relaxed),
            })
            .collect();
        drop(handles);

        infos.sort_by_key(|info| info.handle);
        infos
    }

    /// Tear the registry down, closing every connection still open.
    ///
    /// Outstanding entries are leaks on the caller's side; each one is
    /// logged with enough context to find the unbalanced acquire. Entries
    /// marked uncloseable are dropped from the bookkeeping without the
    /// native close, like on the normal release path.
    pub fn shutdown(&self) {
        let entries: Vec<_> = {
            let mut handles = self.handles.lock().unwrap();
            handles.drain().map(|(_, entry)| entry).collect()
        };
        self.threads.lock().unwrap().clear();

        for entry in entries {
            log::warn!(
                "connection `{}` (handle {}, refs {}, thread `{}`) still open at shutdown",
                entry.name,
                entry.handle,
                entry.refs(),
                entry.thread_name,
            );

            if !entry.uncloseable.load(Ordering::Relaxed) {
                self.backend.close(entry.handle);
            }
        }
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("backend", &self.backend)
            .field("default_name", &self.default_name.get())
            .field("open_connections", &self.open_connection_count())
            .finish()
    }
}
