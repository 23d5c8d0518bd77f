//! Tests for HandlePool
//!
//! These tests verify:
//! - Capacity creation and growth
//! - Binding and unbinding paths through the header block
//! - The bound/available partition after every mutation
//! - Bindings surviving a restart (memory and filesystem stores)
//! - Tampered or ephemeral headers coming back unbound
//! - Unbinding surviving a failed data trim

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use poolvfs::flags::{MAIN_DB_CREATE, TEMP_DB};
use poolvfs::pool::{HandlePool, RetryPolicy, HEADER_OFFSET_DATA, OPAQUE_DIR_NAME};
use poolvfs::storage::{AcquireError, FsStore, MemoryStore, SlotHandle, SlotStore};
use poolvfs::Config;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

fn memory_pool(store: &MemoryStore, capacity: usize) -> HandlePool {
    let mut pool = HandlePool::new(Box::new(store.clone()));
    pool.initialize(capacity, false, &policy()).unwrap();
    pool
}

fn bind(pool: &mut HandlePool, path: &str) -> usize {
    let slot = pool.next_available().expect("free slot");
    pool.associate(slot, path, MAIN_DB_CREATE).unwrap();
    slot
}

/// Memory store whose handles fail `truncate` while `fail_truncate` is set
struct TrimFailingStore {
    inner: MemoryStore,
    fail_truncate: Arc<AtomicBool>,
}

struct TrimFailingSlot {
    inner: Box<dyn SlotHandle>,
    fail_truncate: Arc<AtomicBool>,
}

impl SlotHandle for TrimFailingSlot {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.inner.read_at(buf, offset)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.inner.write_at(buf, offset)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        if self.fail_truncate.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected truncate failure"));
        }
        self.inner.truncate(size)
    }

    fn size(&self) -> io::Result<u64> {
        self.inner.size()
    }
}

impl TrimFailingStore {
    fn wrap(&self, inner: Box<dyn SlotHandle>) -> Box<dyn SlotHandle> {
        Box::new(TrimFailingSlot {
            inner,
            fail_truncate: Arc::clone(&self.fail_truncate),
        })
    }
}

impl SlotStore for TrimFailingStore {
    fn list(&self) -> io::Result<Vec<String>> {
        self.inner.list()
    }

    fn create(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        let handle = self.inner.create(name)?;
        Ok(self.wrap(handle))
    }

    fn acquire(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        let handle = self.inner.acquire(name)?;
        Ok(self.wrap(handle))
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        self.inner.remove(name)
    }
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_initialize_creates_capacity() {
    let store = MemoryStore::new();
    let pool = memory_pool(&store, 4);

    assert!(pool.is_acquired());
    assert_eq!(pool.capacity(), 4);
    assert_eq!(pool.available_count(), 4);
    assert_eq!(pool.bound_count(), 0);
    assert_eq!(store.slot_count(), 4);
}

#[test]
fn test_new_slots_hold_only_a_header_sector() {
    let store = MemoryStore::new();
    let pool = memory_pool(&store, 1);

    let name = pool.slot_name(0).unwrap().to_string();
    let raw = store.raw_bytes(&name).unwrap();
    assert_eq!(raw.len() as u64, HEADER_OFFSET_DATA);
    assert!(raw.iter().all(|&b| b == 0));
}

#[test]
fn test_initialize_keeps_existing_capacity() {
    let store = MemoryStore::new();
    drop(memory_pool(&store, 3));

    let pool = memory_pool(&store, 10);
    assert_eq!(pool.capacity(), 3);
}

#[test]
fn test_add_capacity() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 2);

    assert_eq!(pool.add_capacity(3).unwrap(), 5);
    assert_eq!(pool.available_count(), 5);
    assert!(pool.is_consistent());
}

#[test]
fn test_reserve_minimum_capacity_never_shrinks() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 4);

    assert_eq!(pool.reserve_minimum_capacity(2).unwrap(), 4);
    assert_eq!(pool.reserve_minimum_capacity(6).unwrap(), 6);
    assert_eq!(store.slot_count(), 6);
}

// =============================================================================
// Association Tests
// =============================================================================

#[test]
fn test_associate_binds_lowest_slot() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 3);

    assert_eq!(bind(&mut pool, "a.db"), 0);
    assert_eq!(bind(&mut pool, "b.db"), 1);
    assert_eq!(pool.slot_for_path("a.db"), Some(0));
    assert_eq!(pool.bound_paths(), vec!["a.db".to_string(), "b.db".to_string()]);
    assert!(pool.is_consistent());
}

#[test]
fn test_associated_path_reads_header() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 1);

    bind(&mut pool, "main.db");
    assert_eq!(pool.associated_path(0).as_deref(), Some("main.db"));
}

#[test]
fn test_associate_rejects_path_bound_elsewhere() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 2);

    bind(&mut pool, "a.db");
    assert!(pool.associate(1, "a.db", MAIN_DB_CREATE).is_err());
    assert_eq!(pool.slot_for_path("a.db"), Some(0));
}

#[test]
fn test_unbind_truncates_data() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 1);

    bind(&mut pool, "a.db");
    pool.handle_mut(0)
        .unwrap()
        .write_at(&[7u8; 100], HEADER_OFFSET_DATA)
        .unwrap();

    assert!(pool.delete_path("a.db").unwrap());
    assert_eq!(pool.handle(0).unwrap().size().unwrap(), HEADER_OFFSET_DATA);
    assert_eq!(pool.available_count(), 1);
}

#[test]
fn test_unbind_survives_failed_trim() {
    let store = MemoryStore::new();
    let fail_truncate = Arc::new(AtomicBool::new(false));
    let mut pool = HandlePool::new(Box::new(TrimFailingStore {
        inner: store.clone(),
        fail_truncate: Arc::clone(&fail_truncate),
    }));
    pool.initialize(2, false, &policy()).unwrap();

    bind(&mut pool, "a.db");
    fail_truncate.store(true, Ordering::SeqCst);

    assert!(pool.delete_path("a.db").unwrap());
    assert_eq!(pool.slot_for_path("a.db"), None);
    assert_eq!(pool.available_count(), 2);
    assert!(pool.is_consistent());

    // Memory and disk agree after a restart
    pool.release_all();
    let mut pool = memory_pool(&store, 2);
    assert!(pool.bound_paths().is_empty());
    assert_eq!(pool.associated_path(0), None);
}

#[test]
fn test_delete_path_idempotent() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 2);

    assert!(!pool.delete_path("never.db").unwrap());

    bind(&mut pool, "a.db");
    assert!(pool.delete_path("a.db").unwrap());
    assert!(!pool.delete_path("a.db").unwrap());
    assert!(pool.is_consistent());
}

#[test]
fn test_capacity_invariant_across_mutations() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 3);

    bind(&mut pool, "a.db");
    assert_eq!(pool.bound_count() + pool.available_count(), pool.capacity());

    pool.add_capacity(2).unwrap();
    bind(&mut pool, "b.db");
    assert_eq!(pool.bound_count() + pool.available_count(), pool.capacity());

    pool.delete_path("a.db").unwrap();
    bind(&mut pool, "c.db");
    bind(&mut pool, "d.db");
    assert_eq!(pool.bound_count() + pool.available_count(), pool.capacity());
    assert!(pool.is_consistent());
}

// =============================================================================
// Restart Tests
// =============================================================================

#[test]
fn test_bindings_survive_restart() {
    let store = MemoryStore::new();
    {
        let mut pool = memory_pool(&store, 3);
        bind(&mut pool, "a.db");
        bind(&mut pool, "b.db-journal");
    }

    let pool = memory_pool(&store, 3);
    assert_eq!(pool.capacity(), 3);
    assert_eq!(
        pool.bound_paths(),
        vec!["a.db".to_string(), "b.db-journal".to_string()]
    );
    assert_eq!(pool.available_count(), 1);
}

#[test]
fn test_release_all_then_initialize_rediscovers() {
    let store = MemoryStore::new();
    let mut pool = memory_pool(&store, 2);
    bind(&mut pool, "a.db");

    pool.release_all();
    assert!(!pool.is_acquired());
    assert_eq!(pool.capacity(), 0);

    pool.initialize(2, false, &policy()).unwrap();
    assert_eq!(pool.bound_paths(), vec!["a.db".to_string()]);
}

#[test]
fn test_clear_flag_unbinds_everything() {
    let store = MemoryStore::new();
    {
        let mut pool = memory_pool(&store, 2);
        bind(&mut pool, "a.db");
    }

    let mut pool = HandlePool::new(Box::new(store.clone()));
    pool.initialize(2, true, &policy()).unwrap();
    assert_eq!(pool.bound_count(), 0);
    assert_eq!(pool.available_count(), 2);
}

#[test]
fn test_ephemeral_binding_dropped_on_restart() {
    let store = MemoryStore::new();
    {
        let mut pool = memory_pool(&store, 2);
        let slot = pool.next_available().unwrap();
        pool.associate(slot, "tmp", TEMP_DB).unwrap();
        assert_eq!(pool.bound_count(), 1);
    }

    let pool = memory_pool(&store, 2);
    assert_eq!(pool.bound_count(), 0);
    assert_eq!(pool.available_count(), 2);
}

#[test]
fn test_tampered_header_comes_back_unbound() {
    let store = MemoryStore::new();
    let name = {
        let mut pool = memory_pool(&store, 1);
        bind(&mut pool, "a.db");
        pool.slot_name(0).unwrap().to_string()
    };

    assert!(store.patch_raw(&name, 2, b"X"));

    let mut pool = memory_pool(&store, 1);
    assert_eq!(pool.bound_count(), 0);
    assert_eq!(pool.associated_path(0), None);
    assert!(pool.is_consistent());
}

#[test]
fn test_duplicate_path_claim_cleared() {
    let store = MemoryStore::new();
    let (first, second) = {
        let mut pool = memory_pool(&store, 2);
        bind(&mut pool, "a.db");
        (
            pool.slot_name(0).unwrap().to_string(),
            pool.slot_name(1).unwrap().to_string(),
        )
    };

    // Copy slot 0's header onto slot 1
    let header = store.raw_bytes(&first).unwrap();
    store.patch_raw(&second, 0, &header[..HEADER_OFFSET_DATA as usize]);

    let pool = memory_pool(&store, 2);
    assert_eq!(pool.bound_count(), 1);
    assert_eq!(pool.available_count(), 1);
}

#[test]
fn test_filesystem_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join(OPAQUE_DIR_NAME);
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .initial_capacity(2)
        .acquire_backoff_ms(1)
        .build();

    {
        let mut pool = HandlePool::open(Box::new(FsStore::open(&dir).unwrap()), &config).unwrap();
        let slot = bind(&mut pool, "data/app.db");
        let handle = pool.handle_mut(slot).unwrap();
        handle.write_at(b"persisted", HEADER_OFFSET_DATA + 10).unwrap();
        handle.flush().unwrap();
    }

    let store = FsStore::open(&dir).unwrap();
    assert_eq!(store.list().unwrap().len(), 2);

    let mut pool = HandlePool::open(Box::new(store), &config).unwrap();
    let slot = pool.slot_for_path("data/app.db").expect("binding rediscovered");
    let mut buf = [0u8; 9];
    pool.handle_mut(slot)
        .unwrap()
        .read_at(&mut buf, HEADER_OFFSET_DATA + 10)
        .unwrap();
    assert_eq!(&buf, b"persisted");
}
