//! `tracebridge-runtime`: Wasmtime-based foreign engine that records execution traces.
//!
//! This crate implements [`ForeignEngine`](tracebridge_hostapi::ForeignEngine)
//! on top of Wasmtime. Each engine owns one binary and a linear-memory image;
//! `compute_trace` runs the binary's entry export in a fresh instance and
//! returns a JSON trace, or an `error:<code>` status when execution halts.
//! It enforces:
//!
//! - **Determinism:** No SIMD, no threads, NaN canonicalization
//! - **Fuel metering:** Optional instruction limit, reported as out-of-gas
//! - **Memory limits:** Bounded linear memory growth
//! - **Import whitelisting:** Function imports from one module only, no WASI
//! - **Entry validation:** The entry export must be `() -> ()`
//!
//! Host imports are bound to the global entry points registered through
//! `register_import`; every raw argument buffer starts with the engine id.

pub mod error;
pub mod config;
pub mod memory;
pub mod trace;
pub mod validation;
pub mod linker;
pub mod runtime;

pub use config::RuntimeConfig;
pub use error::Halt;
pub use runtime::TraceRuntime;
pub use trace::{HostCall, MemoryRegion, Trace};
