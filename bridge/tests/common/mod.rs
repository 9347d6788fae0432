//! Shared test helpers for bridge integration tests.
//!
//! Provides engine factories over both foreign engines (the scripted
//! `MemEngine` and the Wasmtime `TraceRuntime`), capture buffers for host
//! callbacks, and the WAT guests the trace tests run.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use tracebridge::WasmEngine;
use tracebridge_hostapi::MemEngine;
use tracebridge_runtime::{RuntimeConfig, TraceRuntime};

// ── Engine Factories ──

pub fn mem_engine() -> (Arc<MemEngine>, WasmEngine) {
    let foreign = Arc::new(MemEngine::new());
    let engine = WasmEngine::new(foreign.clone()).unwrap();
    (foreign, engine)
}

pub fn runtime() -> Arc<TraceRuntime> {
    Arc::new(TraceRuntime::new(RuntimeConfig::default()).unwrap())
}

pub fn runtime_with_config(config: RuntimeConfig) -> Arc<TraceRuntime> {
    Arc::new(TraceRuntime::new(config).unwrap())
}

/// A runtime-backed engine with `wat` installed.
pub fn wasm_engine(runtime: &Arc<TraceRuntime>, wat: &str) -> WasmEngine {
    let engine = WasmEngine::new(runtime.clone()).unwrap();
    engine.set_wasm_binary(wat.as_bytes()).unwrap();
    engine
}

// ── Capture Buffers ──

/// Records every value pushed into it; cheap to clone into callbacks.
#[derive(Debug, Clone)]
pub struct Capture<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> Capture<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.lock().push(value);
    }

    pub fn items(&self) -> Vec<T> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

// ── Guest Modules ──

/// Stores `_evm_balance(7, 8)` at 0 and notifies `_evm_emit(1, 2, 3)`.
pub const BALANCE: &str = r#"
    (module
        (import "env" "_evm_balance" (func $balance (param i32 i32) (result i32)))
        (import "env" "_evm_emit" (func $emit (param i32 i32 i32)))
        (memory (export "memory") 1)
        (func (export "main")
            (i32.store (i32.const 0) (call $balance (i32.const 7) (i32.const 8)))
            (call $emit (i32.const 1) (i32.const 2) (i32.const 3)))
    )
"#;

/// Passes `i64::MAX` and `-1` to `_evm_wide` and stores the result at 0.
pub const WIDE: &str = r#"
    (module
        (import "env" "_evm_wide" (func $wide (param i64 i64) (result i32)))
        (memory (export "memory") 1)
        (func (export "main")
            (i32.store (i32.const 0)
                (call $wide (i64.const 9223372036854775807) (i64.const -1))))
    )
"#;

/// Calls `_evm_tick(n)` with n = 0..count, where count is read from offset 64.
pub const TICKS: &str = r#"
    (module
        (import "env" "_evm_tick" (func $tick (param i32)))
        (memory (export "memory") 1)
        (func (export "main")
            (local $i i32)
            (block $done
                (loop $next
                    (br_if $done (i32.ge_u (local.get $i) (i32.load (i32.const 64))))
                    (call $tick (local.get $i))
                    (local.set $i (i32.add (local.get $i) (i32.const 1)))
                    (br $next))))
    )
"#;

/// Copies 4 bytes from offset 100 to offset 200.
pub const COPY: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "main")
            (i32.store (i32.const 200) (i32.load (i32.const 100))))
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
        (func (export "main") (call $revert (i32.const 0) (i32.const 0)))
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
        (func (export "main") unreachable)
    )
"#;
