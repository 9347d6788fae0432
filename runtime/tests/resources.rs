//! Resource limit tests: fuel exhaustion, memory limits, module validation,
//! and memory bounds.
//!
//! These tests verify that the runtime enforces its limits and reports
//! out-of-range requests instead of clamping them.

mod common;

use tracebridge_hostapi::{EngineError, EngineId, ForeignEngine, TraceStatus};
use tracebridge_runtime::RuntimeConfig;

use common::*;

// ── Test: fuel exhaustion ──

#[test]
fn test_fuel_exhaustion_reports_out_of_gas() {
    let config = RuntimeConfig {
        fuel_limit: Some(10_000),
        ..RuntimeConfig::default()
    };
    let rt = runtime_with_config(config);

    let payload = rt.execute_binary(SPIN.as_bytes()).unwrap();
    assert_eq!(payload, TraceStatus::OutOfGas.encode());
}

#[test]
fn test_fuel_limit_allows_short_programs() {
    let config = RuntimeConfig {
        fuel_limit: Some(1_000_000),
        ..RuntimeConfig::default()
    };
    let rt = runtime_with_config(config);

    let payload = rt.execute_binary(MEMORY_COPY.as_bytes()).unwrap();
    assert!(trace_json(&payload).is_object());
}

// ── Test: memory limits ──

#[test]
fn test_memory_grow_beyond_limit_fails_in_guest() {
    let config = RuntimeConfig {
        max_memory_pages: 4,
        ..RuntimeConfig::default()
    };
    let rt = runtime_with_config(config);
    let engine = load(&rt, GROW);

    rt.compute_trace(engine).unwrap();

    let memory = rt.memory_snapshot(engine).unwrap();
    assert_eq!(memory.len(), 65536);
    assert_eq!(&memory[0..4], &(-1i32).to_le_bytes());
}

#[test]
fn test_initial_memory_beyond_limit_fails_to_link() {
    let config = RuntimeConfig {
        max_memory_pages: 1,
        ..RuntimeConfig::default()
    };
    let rt = runtime_with_config(config);
    let wat = r#"(module (memory (export "memory") 4) (func (export "main")))"#;
    let engine = load(&rt, wat);

    let err = rt.compute_trace(engine).unwrap_err();
    assert!(matches!(err, EngineError::Link(_)), "got: {:?}", err);
}

// ── Test: module validation ──

#[test]
fn test_rejects_module_without_entry() {
    let rt = runtime();
    let engine = rt.create_engine().unwrap();
    let err = rt
        .set_binary(engine, br#"(module (func (export "start")))"#)
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_rejects_wasi_module() {
    let rt = runtime();
    let engine = rt.create_engine().unwrap();
    let wat = r#"
        (module
            (import "wasi_snapshot_preview1" "proc_exit" (func (param i32)))
            (func (export "main"))
        )
    "#;
    let err = rt.set_binary(engine, wat.as_bytes()).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_unregistered_import_fails_to_link() {
    let rt = runtime();
    let engine = load(&rt, HOST_CALLS);

    let err = rt.compute_trace(engine).unwrap_err();
    assert!(matches!(err, EngineError::Link(ref msg) if msg.contains("_evm_log")));
}

// ── Test: memory bounds ──

#[test]
fn test_patch_out_of_bounds_is_reported() {
    let rt = runtime();
    let engine = load(&rt, MEMORY_COPY);

    let err = rt.patch_memory(engine, 65535, 2, &[1, 2]).unwrap_err();
    assert!(matches!(
        err,
        EngineError::MemoryOutOfBounds { offset: 65535, length: 2, size: 65536 }
    ));
    // Nothing was recorded.
    let trace = trace_json(&rt.compute_trace(engine).unwrap());
    assert!(trace["memory_changes"].as_array().unwrap().is_empty());
}

#[test]
fn test_patch_length_mismatch_is_reported() {
    let rt = runtime();
    let engine = load(&rt, MEMORY_COPY);

    let err = rt.patch_memory(engine, 0, 3, &[1]).unwrap_err();
    assert!(matches!(
        err,
        EngineError::PatchLengthMismatch { length: 3, data_len: 1 }
    ));
}

#[test]
fn test_operations_on_unknown_engine() {
    let rt = runtime();
    let missing = EngineId(u32::MAX - 1);
    assert!(matches!(rt.memory_snapshot(missing), Err(EngineError::UnknownEngine(_))));
    assert!(matches!(rt.set_binary(missing, b"(module)"), Err(EngineError::UnknownEngine(_))));
    assert!(!rt.register_log_listener(missing, capture_log));
}
