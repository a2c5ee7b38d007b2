#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dpylease::backend::{DisplayBackend, ToolkitBackend, UpstreamSurfaceHook};
use dpylease::device::Device;
use dpylease::handle::RawHandle;
use dpylease::lock::NullToolkitLock;
use dpylease::registry::ConnectionRegistry;

/// In-memory display backend handing out unique fake handles.
#[derive(Debug)]
pub struct CountingBackend {
    default_name: String,
    next: AtomicU64,
    fail_default: AtomicBool,
    failing: Mutex<HashSet<String>>,
    opened: Mutex<Vec<(Option<String>, RawHandle)>>,
    closed: Mutex<Vec<RawHandle>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            default_name: ":0".to_owned(),
            next: AtomicU64::new(0x1000),
            fail_default: AtomicBool::new(false),
            failing: Mutex::new(HashSet::new()),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_name(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_owned());
    }

    pub fn fail_default(&self) {
        self.fail_default.store(true, Ordering::Relaxed);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn opens_of(&self, name: &str) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|(opened, _)| opened.as_deref() == Some(name))
            .count()
    }

    pub fn default_opens(&self) -> usize {
        self.opened.lock().unwrap().iter().filter(|(opened, _)| opened.is_none()).count()
    }

    pub fn closed_handles(&self) -> Vec<RawHandle> {
        self.closed.lock().unwrap().clone()
    }

    pub fn was_closed(&self, handle: RawHandle) -> bool {
        self.closed.lock().unwrap().contains(&handle)
    }
}

impl DisplayBackend for CountingBackend {
    fn open(&self, name: Option<&str>) -> RawHandle {
        let failed = match name {
            Some(name) => self.failing.lock().unwrap().contains(name),
            None => self.fail_default.load(Ordering::Relaxed),
        };
        if failed {
            return RawHandle::NULL;
        }

        let handle = RawHandle::from_raw(self.next.fetch_add(1, Ordering::Relaxed));
        self.opened.lock().unwrap().push((name.map(str::to_owned), handle));
        handle
    }

    fn close(&self, handle: RawHandle) {
        self.closed.lock().unwrap().push(handle);
    }

    fn query_name(&self, _handle: RawHandle) -> Option<String> {
        Some(self.default_name.clone())
    }
}

/// Toolkit primitives counting every native lock transition.
#[derive(Debug, Default)]
pub struct CountingToolkit {
    locks: AtomicU64,
    unlocks: AtomicU64,
}

impl CountingToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_locks(&self) -> u64 {
        self.locks.load(Ordering::Relaxed)
    }

    pub fn native_unlocks(&self) -> u64 {
        self.unlocks.load(Ordering::Relaxed)
    }
}

impl ToolkitBackend for CountingToolkit {
    fn lock_toolkit(&self) {
        self.locks.fetch_add(1, Ordering::Relaxed);
    }

    fn unlock_toolkit(&self) {
        self.unlocks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Surface hook producing fake windows, optionally failing.
#[derive(Debug)]
pub struct CountingHook {
    next: AtomicU64,
    fail: AtomicBool,
    created: Mutex<Vec<RawHandle>>,
    destroyed: Mutex<Vec<RawHandle>>,
}

impl CountingHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: AtomicU64::new(0x9000),
            fail: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_creation(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn destroyed_handles(&self) -> Vec<RawHandle> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl UpstreamSurfaceHook for CountingHook {
    fn create(&self, _device: &Device) -> RawHandle {
        if self.fail.load(Ordering::Relaxed) {
            return RawHandle::NULL;
        }

        let handle = RawHandle::from_raw(self.next.fetch_add(1, Ordering::Relaxed));
        self.created.lock().unwrap().push(handle);
        handle
    }

    fn destroy(&self, _device: &Device, handle: RawHandle) {
        self.destroyed.lock().unwrap().push(handle);
    }
}

pub fn registry() -> (Arc<CountingBackend>, Arc<ConnectionRegistry>) {
    let backend = Arc::new(CountingBackend::new());
    let registry = Arc::new(ConnectionRegistry::new(backend.clone()));
    (backend, registry)
}

pub fn device(registry: &Arc<ConnectionRegistry>, connection: &str) -> Arc<Device> {
    Arc::new(Device::new(registry.clone(), Some(connection), 0, Arc::new(NullToolkitLock)))
}
