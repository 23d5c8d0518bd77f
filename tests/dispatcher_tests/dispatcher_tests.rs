//! Tests for the request dispatcher and worker
//!
//! These tests verify:
//! - Every operation's result shape
//! - Structured errors for unknown operations and bad arguments
//! - Lazy initialization, cleanup and wipe
//! - The worker thread and its request ids

use std::sync::{Arc, Mutex};
use std::time::Duration;

use poolvfs::protocol::Request;
use poolvfs::storage::MemoryStore;
use poolvfs::{Config, Dispatcher, LogLevel, Worker};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .initial_capacity(3)
        .acquire_backoff_ms(1)
        .build()
}

fn setup_dispatcher() -> (MemoryStore, Dispatcher) {
    let store = MemoryStore::new();
    let dispatcher = Dispatcher::with_store(test_config(), Box::new(store.clone()));
    (store, dispatcher)
}

/// Run one operation, asserting success; returns the result
fn call(dispatcher: &mut Dispatcher, operation: &str, args: Value) -> Value {
    let response = dispatcher.handle(Request::new(1, operation, args));
    assert!(
        response.success,
        "{} failed: {:?}",
        operation,
        response.error
    );
    response.result.unwrap_or(Value::Null)
}

/// Run one operation, asserting failure; returns the error message
fn call_err(dispatcher: &mut Dispatcher, operation: &str, args: Value) -> String {
    let response = dispatcher.handle(Request::new(1, operation, args));
    assert!(!response.success, "{} unexpectedly succeeded", operation);
    assert!(response.result.is_none());
    response.error.unwrap()
}

// =============================================================================
// Capacity Operations
// =============================================================================

#[test]
fn test_get_capacity_initializes_lazily() {
    let (store, mut dispatcher) = setup_dispatcher();
    assert_eq!(store.slot_count(), 0);

    let result = call(&mut dispatcher, "getCapacity", Value::Null);
    assert_eq!(result, json!({ "capacity": 3, "fileCount": 0 }));
    assert_eq!(store.slot_count(), 3);
}

#[test]
fn test_add_and_reserve_capacity() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let result = call(&mut dispatcher, "addCapacity", json!({ "count": 2 }));
    assert_eq!(result, json!({ "capacity": 5 }));

    let result = call(&mut dispatcher, "reserveMinimumCapacity", json!({ "minimum": 4 }));
    assert_eq!(result, json!({ "capacity": 5 }));

    let result = call(&mut dispatcher, "reserveMinimumCapacity", json!({ "minimum": 8 }));
    assert_eq!(result, json!({ "capacity": 8 }));
}

// =============================================================================
// File Operations
// =============================================================================

#[test]
fn test_write_read_list_and_count() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let result = call(
        &mut dispatcher,
        "writeFile",
        json!({ "filename": "b.db", "data": [1, 2, 3] }),
    );
    assert_eq!(result, json!({ "bytesWritten": 3 }));
    call(&mut dispatcher, "writeFile", json!({ "filename": "/a.db", "data": [] }));

    let result = call(&mut dispatcher, "readFile", json!({ "filename": "b.db" }));
    assert_eq!(result, json!({ "data": [1, 2, 3] }));

    let result = call(&mut dispatcher, "getFileList", Value::Null);
    assert_eq!(result, json!({ "files": ["a.db", "b.db"] }));

    let result = call(&mut dispatcher, "getFileCount", Value::Null);
    assert_eq!(result, json!({ "count": 2 }));

    let result = call(&mut dispatcher, "getCapacity", Value::Null);
    assert_eq!(result, json!({ "capacity": 3, "fileCount": 2 }));
}

#[test]
fn test_read_missing_file() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let result = call(&mut dispatcher, "readFile", json!({ "filename": "nope.db" }));
    assert_eq!(result, json!({ "data": [] }));
}

#[test]
fn test_exists_and_delete() {
    let (_store, mut dispatcher) = setup_dispatcher();
    call(&mut dispatcher, "writeFile", json!({ "filename": "a.db", "data": [9] }));

    let result = call(&mut dispatcher, "fileExists", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "exists": true }));

    let result = call(&mut dispatcher, "deleteFile", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "deleted": true }));

    let result = call(&mut dispatcher, "deleteFile", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "deleted": false }));

    let result = call(&mut dispatcher, "fileExists", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "exists": false }));
}

#[test]
fn test_pool_exhaustion_is_structured_error() {
    let (_store, mut dispatcher) = setup_dispatcher();

    for name in ["a.db", "b.db", "c.db"] {
        call(&mut dispatcher, "writeFile", json!({ "filename": name, "data": [1] }));
    }
    let error = call_err(
        &mut dispatcher,
        "writeFile",
        json!({ "filename": "d.db", "data": [1] }),
    );
    assert!(error.contains("exhausted"), "{}", error);

    // The dispatcher keeps serving
    let result = call(&mut dispatcher, "getFileCount", Value::Null);
    assert_eq!(result, json!({ "count": 3 }));
}

#[test]
fn test_persist_dirty_pages_only_changes_listed_page() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let mut original = vec![1u8; 4096];
    original.extend(vec![2u8; 4096]);
    call(&mut dispatcher, "writeFile", json!({ "filename": "d.db", "data": original }));

    let result = call(
        &mut dispatcher,
        "persistDirtyPages",
        json!({
            "filename": "d.db",
            "pages": [{ "pageNumber": 1, "data": vec![3u8; 4096] }],
        }),
    );
    assert_eq!(result, json!({ "pagesWritten": 1, "bytesWritten": 4096 }));

    let result = call(&mut dispatcher, "readFile", json!({ "filename": "d.db" }));
    let data: Vec<u8> = serde_json::from_value(result["data"].clone()).unwrap();
    assert_eq!(data.len(), 8192);
    assert!(data[..4096].iter().all(|&b| b == 1));
    assert!(data[4096..].iter().all(|&b| b == 3));
}

#[test]
fn test_persist_with_explicit_page_size() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let result = call(
        &mut dispatcher,
        "persistDirtyPages",
        json!({
            "filename": "p.db",
            "pageSize": 1024,
            "pages": [{ "pageNumber": 0, "data": [5, 5] }, { "pageNumber": 3, "data": [6] }],
        }),
    );
    assert_eq!(result, json!({ "pagesWritten": 2, "bytesWritten": 3 }));

    let result = call(&mut dispatcher, "readFile", json!({ "filename": "p.db" }));
    let data: Vec<u8> = serde_json::from_value(result["data"].clone()).unwrap();
    assert_eq!(data.len(), 3 * 1024 + 1);
    assert_eq!(data[3 * 1024], 6);
}

#[test]
fn test_persist_rejects_unaddressable_pages() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let error = call_err(
        &mut dispatcher,
        "persistDirtyPages",
        json!({
            "filename": "big.db",
            "pageSize": 9223372036854775807u64,
            "pages": [{ "pageNumber": 4294967295u32, "data": [1] }],
        }),
    );
    assert!(error.contains("out of range"), "{}", error);

    let error = call_err(
        &mut dispatcher,
        "persistDirtyPages",
        json!({
            "filename": "big.db",
            "pageSize": 2,
            "pages": [{ "pageNumber": 0, "data": [1, 2, 3] }],
        }),
    );
    assert!(error.contains("page size 2"), "{}", error);

    // Nothing was created and the dispatcher keeps serving
    let result = call(&mut dispatcher, "fileExists", json!({ "filename": "big.db" }));
    assert_eq!(result, json!({ "exists": false }));
    let result = call(&mut dispatcher, "getCapacity", Value::Null);
    assert_eq!(result, json!({ "capacity": 3, "fileCount": 0 }));
}

#[test]
fn test_import_database() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let mut image = vec![0u8; 1024];
    image[..16].copy_from_slice(b"SQLite format 3\0");
    image[18] = 2;
    image[19] = 2;

    let result = call(
        &mut dispatcher,
        "importDatabase",
        json!({ "filename": "main.db", "data": image }),
    );
    assert_eq!(result, json!({ "bytesWritten": 1024 }));

    let result = call(&mut dispatcher, "readFile", json!({ "filename": "main.db" }));
    assert_eq!(result["data"][18], json!(1));
    assert_eq!(result["data"][19], json!(1));

    let error = call_err(
        &mut dispatcher,
        "importDatabase",
        json!({ "filename": "bad.db", "data": [1, 2, 3] }),
    );
    assert!(error.contains("Invalid database"), "{}", error);
}

// =============================================================================
// Dirty Page Operations
// =============================================================================

#[test]
fn test_dirty_pages_round_trip() {
    let (_store, mut dispatcher) = setup_dispatcher();

    call(
        &mut dispatcher,
        "writeFile",
        json!({ "filename": "a.db", "data": vec![0u8; 4097] }),
    );
    let result = call(&mut dispatcher, "getDirtyPages", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "pages": [0, 1] }));

    let result = call(&mut dispatcher, "resetDirtyPages", json!({ "filename": "a.db" }));
    assert_eq!(result, Value::Null);

    let result = call(&mut dispatcher, "getDirtyPages", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "pages": [] }));
}

// =============================================================================
// Lifecycle Operations
// =============================================================================

#[test]
fn test_cleanup_releases_and_next_request_reacquires() {
    let (store, mut dispatcher) = setup_dispatcher();
    call(&mut dispatcher, "writeFile", json!({ "filename": "a.db", "data": [1] }));

    let result = call(&mut dispatcher, "cleanup", Value::Null);
    assert_eq!(result, Value::Null);
    assert!(!dispatcher.vfs().pool().is_acquired());
    let names = poolvfs::storage::SlotStore::list(&store).unwrap();
    assert!(names.iter().all(|name| !store.is_held(name)));

    let result = call(&mut dispatcher, "fileExists", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "exists": true }));
}

#[test]
fn test_clear_on_init_applies_once() {
    let store = MemoryStore::new();
    {
        let mut dispatcher = Dispatcher::with_store(test_config(), Box::new(store.clone()));
        call(&mut dispatcher, "writeFile", json!({ "filename": "old.db", "data": [1] }));
    }

    let config = Config::builder()
        .initial_capacity(3)
        .clear_on_init(true)
        .build();
    let mut dispatcher = Dispatcher::with_store(config, Box::new(store.clone()));

    let result = call(&mut dispatcher, "getFileList", Value::Null);
    assert_eq!(result, json!({ "files": [] }));

    call(&mut dispatcher, "writeFile", json!({ "filename": "new.db", "data": [1] }));
    call(&mut dispatcher, "cleanup", Value::Null);

    let result = call(&mut dispatcher, "getFileList", Value::Null);
    assert_eq!(result, json!({ "files": ["new.db"] }));
}

#[test]
fn test_wipe_files() {
    let (_store, mut dispatcher) = setup_dispatcher();
    call(&mut dispatcher, "writeFile", json!({ "filename": "a.db", "data": [1] }));
    call(&mut dispatcher, "addCapacity", json!({ "count": 1 }));

    let result = call(&mut dispatcher, "wipeFiles", Value::Null);
    assert_eq!(result, json!({ "capacity": 4 }));

    let result = call(&mut dispatcher, "getCapacity", Value::Null);
    assert_eq!(result, json!({ "capacity": 4, "fileCount": 0 }));
}

#[test]
fn test_set_log_level() {
    let (_store, dispatcher) = setup_dispatcher();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&applied);
    let mut dispatcher = dispatcher.with_log_hook(Box::new(move |level: LogLevel| {
        sink.lock().unwrap().push(level);
        Ok(())
    }));

    let result = call(&mut dispatcher, "setLogLevel", json!({ "level": "DEBUG" }));
    assert_eq!(result, json!({ "level": "debug" }));
    assert_eq!(dispatcher.log_level(), LogLevel::Debug);
    assert_eq!(*applied.lock().unwrap(), vec![LogLevel::Debug]);

    let error = call_err(&mut dispatcher, "setLogLevel", json!({ "level": "loud" }));
    assert!(error.contains("loud"), "{}", error);
    assert_eq!(dispatcher.log_level(), LogLevel::Debug);

    // Log level changes never touch the pool
    assert!(!dispatcher.vfs().pool().is_acquired());
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn test_unknown_operation() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let response = dispatcher.handle(Request::new(42, "formatDisk", Value::Null));
    assert_eq!(response.id, 42);
    assert!(!response.success);
    assert!(response.error.unwrap().contains("formatDisk"));
}

#[test]
fn test_bad_arguments() {
    let (_store, mut dispatcher) = setup_dispatcher();

    let error = call_err(&mut dispatcher, "readFile", json!({ "file": "a.db" }));
    assert!(error.contains("readFile"), "{}", error);

    call_err(&mut dispatcher, "addCapacity", json!({ "count": -1 }));
    call_err(&mut dispatcher, "writeFile", json!({ "filename": "a.db", "data": "text" }));
}

#[test]
fn test_invalid_path_is_structured_error() {
    let (_store, mut dispatcher) = setup_dispatcher();
    call_err(&mut dispatcher, "writeFile", json!({ "filename": "/", "data": [1] }));
}

#[test]
fn test_response_echoes_id() {
    let (_store, mut dispatcher) = setup_dispatcher();
    let response = dispatcher.handle(Request::new(7, "getCapacity", Value::Null));
    assert_eq!(response.id, 7);
}

// =============================================================================
// Filesystem-backed Dispatcher
// =============================================================================

#[test]
fn test_open_on_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .initial_capacity(2)
        .build();

    {
        let mut dispatcher = Dispatcher::open(config.clone()).unwrap();
        call(&mut dispatcher, "writeFile", json!({ "filename": "a.db", "data": [4, 5] }));
    }
    assert_eq!(
        std::fs::read_dir(temp_dir.path().join(".opaque")).unwrap().count(),
        2
    );

    let mut dispatcher = Dispatcher::open(config).unwrap();
    let result = call(&mut dispatcher, "readFile", json!({ "filename": "a.db" }));
    assert_eq!(result, json!({ "data": [4, 5] }));
}

// =============================================================================
// Worker Tests
// =============================================================================

#[test]
fn test_worker_assigns_ids_in_order() {
    let (_store, dispatcher) = setup_dispatcher();
    let worker = Worker::spawn(dispatcher).unwrap();

    let first = worker.call("getCapacity", Value::Null).unwrap();
    let second = worker
        .call("writeFile", json!({ "filename": "a.db", "data": [1] }))
        .unwrap();
    let third = worker
        .call_timeout("getFileList", Value::Null, Duration::from_secs(5))
        .unwrap();

    assert_eq!((first.id, second.id, third.id), (1, 2, 3));
    assert!(first.success && second.success && third.success);
    assert_eq!(third.result, Some(json!({ "files": ["a.db"] })));
}

#[test]
fn test_worker_shutdown_releases_pool() {
    let (store, dispatcher) = setup_dispatcher();
    let worker = Worker::spawn(dispatcher).unwrap();
    worker
        .call("writeFile", json!({ "filename": "a.db", "data": [1] }))
        .unwrap();

    let dispatcher = worker.shutdown().unwrap();
    assert!(!dispatcher.vfs().pool().is_acquired());
    let names = poolvfs::storage::SlotStore::list(&store).unwrap();
    assert!(names.iter().all(|name| !store.is_held(name)));
}

#[test]
fn test_worker_reports_errors_as_responses() {
    let (_store, dispatcher) = setup_dispatcher();
    let worker = Worker::spawn(dispatcher).unwrap();

    let response = worker.call("nope", Value::Null).unwrap();
    assert!(!response.success);

    let response = worker.call("getFileCount", Value::Null).unwrap();
    assert_eq!(response.result, Some(json!({ "count": 0 })));
}
