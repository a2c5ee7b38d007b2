//! Recursive locking for non-thread-safe native toolkits.
//!
//! Native toolkits like X11 or AWT tolerate only one thread inside them at
//! a time, while the same thread regularly re-enters locked code paths,
//! e.g. a callback running while the caller already holds the lock. The
//! [`RecursiveToolkitLock`] therefore tracks an explicit owner and depth:
//! the native primitives fire exactly once per thread, on the outermost
//! lock and the final unlock.
//!
//! Unlocking from a thread that does not own the lock panics. Silently
//! ignoring it would mask a lock-balance bug that corrupts the toolkit's
//! state, which is far harder to debug than the panic.

use std::backtrace::Backtrace;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use crate::backend::ToolkitBackend;
use crate::error::current_thread_name;

/// A re-entrant, thread-owned lock over a native toolkit.
pub trait ToolkitLock: Send + Sync + fmt::Debug {
    /// Acquire the lock, blocking while another thread owns it.
    ///
    /// Re-acquiring on the owning thread never blocks; it only deepens the
    /// recursion.
    fn lock(&self);

    /// Release one level of the lock.
    ///
    /// # Panics
    ///
    /// Panics when the calling thread does not own the lock.
    fn unlock(&self);

    /// Whether the calling thread currently owns the lock.
    fn is_locked_by_current_thread(&self) -> bool;
}

/// RAII wrapper releasing one level of a [`ToolkitLock`] on drop.
#[derive(Debug)]
pub struct ToolkitLockGuard<'a> {
    lock: &'a dyn ToolkitLock,
    // Unlocking must happen on the acquiring thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a> ToolkitLockGuard<'a> {
    /// Acquire `lock` and release it when the guard goes out of scope.
    pub fn new(lock: &'a dyn ToolkitLock) -> Self {
        lock.lock();
        Self { lock, _not_send: PhantomData }
    }
}

impl Drop for ToolkitLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[derive(Debug)]
struct LockState {
    owner: Option<ThreadId>,
    owner_name: String,
    depth: u32,
    /// Where the owner took the outermost lock, when tracing is on.
    held_since: Option<Backtrace>,
}

/// Owner and depth tracking around a [`ToolkitBackend`]'s non-reentrant
/// lock primitives.
///
/// The state sits behind a plain mutex/condvar pair rather than a
/// reentrant mutex: the contract requires that an unlock from a non-owning
/// thread fails loudly, and that the native primitives fire only on the
/// outermost transition, neither of which a built-in reentrant lock
/// expresses.
#[derive(Debug)]
pub struct RecursiveToolkitLock {
    toolkit: Arc<dyn ToolkitBackend>,
    state: Mutex<LockState>,
    unlocked: Condvar,
    tracing: bool,
}

impl RecursiveToolkitLock {
    /// Create a lock over the given toolkit primitives.
    pub fn new(toolkit: Arc<dyn ToolkitBackend>) -> Self {
        Self::with_tracing(toolkit, false)
    }

    /// Like [`RecursiveToolkitLock::new`], but when `tracing` is set the
    /// outermost `lock()` records the acquiring thread's backtrace, and a
    /// conflicting `lock()` logs who is holding the lock before blocking.
    pub fn with_tracing(toolkit: Arc<dyn ToolkitBackend>, tracing: bool) -> Self {
        Self {
            toolkit,
            state: Mutex::new(LockState {
                owner: None,
                owner_name: String::new(),
                depth: 0,
                held_since: None,
            }),
            unlocked: Condvar::new(),
            tracing,
        }
    }

    /// The current recursion depth, `0` when unheld.
    pub fn depth(&self) -> u32 {
        self.state.lock().unwrap().depth
    }

    /// Name of the owning thread, if the lock is held.
    pub fn holder(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.owner.map(|_| state.owner_name.clone())
    }
}

impl ToolkitLock for RecursiveToolkitLock {
    fn lock(&self) {
        let current = thread::current();
        let mut state = self.state.lock().unwrap();

        if state.owner == Some(current.id()) {
            state.depth += 1;
            return;
        }

        if self.tracing && state.owner.is_some() {
            log::debug!(
                "thread `{}` waiting for toolkit lock held by `{}` (depth {}), taken at:\n{:?}",
                current_thread_name(),
                state.owner_name,
                state.depth,
                state.held_since,
            );
        }

        while state.owner.is_some() {
            state = self.unlocked.wait(state).unwrap();
        }

        state.owner = Some(current.id());
        state.owner_name = current_thread_name();
        state.depth = 1;
        if self.tracing {
            state.held_since = Some(Backtrace::force_capture());
        }
        drop(state);

        // Outermost acquisition: take the native lock once, outside the
        // state mutex so a slow toolkit blocks contenders on the condvar.
        self.toolkit.lock_toolkit();
    }

    fn unlock(&self) {
        let current = thread::current();
        let mut state = self.state.lock().unwrap();

        if state.owner != Some(current.id()) {
            panic!(
                "toolkit lock unlocked by non-owner: thread `{}` does not hold the lock \
                 (owner `{}`, depth {})",
                current_thread_name(),
                if state.owner.is_some() { state.owner_name.as_str() } else { "<none>" },
                state.depth,
            );
        }

        if state.depth > 1 {
            state.depth -= 1;
            return;
        }

        // Final unlock: release the native lock before publishing
        // availability, so no contender reaches the toolkit early.
        self.toolkit.unlock_toolkit();
        state.owner = None;
        state.owner_name.clear();
        state.depth = 0;
        state.held_since = None;
        drop(state);

        self.unlocked.notify_one();
    }

    fn is_locked_by_current_thread(&self) -> bool {
        self.state.lock().unwrap().owner == Some(thread::current().id())
    }
}

/// A lock for toolkits that need no serialization.
///
/// All operations are no-ops; every thread passes ownership checks. Used
/// as the device lock where the underlying API is itself thread-safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullToolkitLock;

impl ToolkitLock for NullToolkitLock {
    fn lock(&self) {}

    fn unlock(&self) {}

    fn is_locked_by_current_thread(&self) -> bool {
        true
    }
}
