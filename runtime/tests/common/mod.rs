//! Shared test helpers for integration tests.
//!
//! Provides WAT guest modules, recording entry points, and runtime factory
//! functions used across all integration test files. Entry points record
//! into process-wide buffers keyed by engine id, so tests running in
//! parallel only ever look at their own engine's records.

#![allow(dead_code)]

use parking_lot::Mutex;

use tracebridge_hostapi::{CallShape, EngineId, EntryPoint, FatalError, ForeignEngine};
use tracebridge_runtime::{RuntimeConfig, TraceRuntime};

// ── Guest Modules ──

/// Calls one import of each shape and stores the two results at 0 and 4.
pub const HOST_CALLS: &str = r#"
    (module
        (import "env" "_evm_log" (func $log (param i32 i32)))
        (import "env" "_evm_add" (func $add (param i32 i32) (result i32)))
        (import "env" "_evm_add_wide" (func $add_wide (param i64 i64) (result i32)))
        (memory (export "memory") 1)
        (func (export "main")
            (call $log (i32.const 1) (i32.const 2))
            (i32.store (i32.const 0) (call $add (i32.const 20) (i32.const 22)))
            (i32.store (i32.const 4) (call $add_wide (i64.const 40) (i64.const 2))))
    )
"#;

/// Copies the byte at 100 to 200.
pub const MEMORY_COPY: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "main")
            (i32.store8 (i32.const 200) (i32.load8_u (i32.const 100))))
    )
"#;

/// Has initialized data at 16 and 1024.
pub const WITH_DATA: &str = r#"
    (module
        (memory (export "memory") 1)
        (data (i32.const 16) "\01\02\03")
        (data (i32.const 1024) "trace")
        (func (export "main"))
    )
"#;

pub const STOP: &str = r#"
    (module
        (import "env" "_evm_stop" (func $stop))
        (memory (export "memory") 1)
        (func (export "main") (call $stop))
    )
"#;

pub const REVERT: &str = r#"
    (module
        (import "env" "_evm_revert" (func $revert (param i32 i32)))
        (memory (export "memory") 1)
        (func (export "main") (call $revert (i32.const 0) (i32.const 32)))
    )
"#;

pub const SPIN: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "main") (loop $l (br $l)))
    )
"#;

pub const UNREACHABLE: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "main") unreachable)
    )
"#;

/// Tries to grow memory by 8 pages and stores the result at 0.
pub const GROW: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "main")
            (i32.store (i32.const 0) (memory.grow (i32.const 8))))
    )
"#;

// ── Recording Entry Points ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub engine: EngineId,
    pub name: String,
    /// Raw buffer as received, marker included.
    pub raw: Vec<i64>,
}

static CALLS: Mutex<Vec<Call>> = parking_lot::const_mutex(Vec::new());
static LOGS: Mutex<Vec<(EngineId, Vec<u8>)>> = parking_lot::const_mutex(Vec::new());

fn record(engine: EngineId, name: &str, raw: Vec<i64>) {
    CALLS.lock().push(Call {
        engine,
        name: name.to_string(),
        raw,
    });
}

pub fn record_notify(engine: EngineId, name: &str, raw: &[i32]) -> Result<(), FatalError> {
    record(engine, name, raw.iter().map(|&v| i64::from(v)).collect());
    Ok(())
}

/// Sum of the arguments after the marker.
pub fn sum_i32(engine: EngineId, name: &str, raw: &[i32]) -> Result<i32, FatalError> {
    record(engine, name, raw.iter().map(|&v| i64::from(v)).collect());
    Ok(raw[1..].iter().sum())
}

pub fn sum_i64(engine: EngineId, name: &str, raw: &[i64]) -> Result<i32, FatalError> {
    record(engine, name, raw.to_vec());
    Ok(raw[1..].iter().sum::<i64>() as i32)
}

pub fn reject_i32(engine: EngineId, name: &str, _: &[i32]) -> Result<i32, FatalError> {
    Err(FatalError::UnknownFunction {
        engine,
        name: name.to_string(),
    })
}

pub fn capture_log(engine: EngineId, fragment: &[u8]) -> Result<(), FatalError> {
    LOGS.lock().push((engine, fragment.to_vec()));
    Ok(())
}

pub fn calls_for(engine: EngineId) -> Vec<Call> {
    CALLS
        .lock()
        .iter()
        .filter(|c| c.engine == engine)
        .cloned()
        .collect()
}

pub fn logs_for(engine: EngineId) -> Vec<serde_json::Value> {
    LOGS.lock()
        .iter()
        .filter(|(id, _)| *id == engine)
        .map(|(_, fragment)| serde_json::from_slice(fragment).unwrap())
        .collect()
}

// ── Runtime Factories ──

pub fn runtime() -> TraceRuntime {
    runtime_with_config(RuntimeConfig::default())
}

pub fn runtime_with_config(config: RuntimeConfig) -> TraceRuntime {
    TraceRuntime::new(config).unwrap()
}

/// Create an engine and install `wat` on it.
pub fn load(rt: &TraceRuntime, wat: &str) -> EngineId {
    let engine = rt.create_engine().unwrap();
    rt.set_binary(engine, wat.as_bytes()).unwrap();
    engine
}

/// Bind the three imports of [`HOST_CALLS`] to the recording entry points.
pub fn bind_host_calls(rt: &TraceRuntime, engine: EngineId) {
    assert!(rt.register_import(
        engine,
        "_evm_log",
        CallShape::Notify { arity: 2 },
        EntryPoint::Notify(record_notify),
    ));
    assert!(rt.register_import(
        engine,
        "_evm_add",
        CallShape::I32 { params: 2 },
        EntryPoint::I32(sum_i32),
    ));
    assert!(rt.register_import(
        engine,
        "_evm_add_wide",
        CallShape::I64 { params: 2 },
        EntryPoint::I64(sum_i64),
    ));
}

pub fn trace_json(payload: &[u8]) -> serde_json::Value {
    serde_json::from_slice(payload).unwrap()
}
