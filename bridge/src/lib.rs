//! `tracebridge`: host-function callback bridge for a foreign WASM trace engine.
//!
//! A foreign engine identifies engines by integer and calls back into the
//! host through a handful of global entry points. This crate keeps the
//! managed side of that contract:
//!
//! - **Registry:** process-wide `EngineId` → `EngineRecord` directory
//! - **Registration:** one-shot host functions with a closed set of call shapes
//! - **Dispatch:** marker and shape checked routing from entry points to callbacks
//! - **Tracing:** `compute_trace` with `error:<code>` status decoding
//! - **Logs:** at most one subscriber per engine for execution-log items
//! - **Memory:** snapshots and recorded patches for witness replay
//!
//! Binding-contract violations are fatal: they are reported to the
//! [`fatal`] handler and returned as [`BridgeError::Fatal`], never folded
//! into a [`TraceResult`].
//!
//! The primary entry point is [`WasmEngine`].

pub mod error;
pub mod fatal;
pub mod descriptor;
pub mod record;
pub mod registry;
pub mod dispatcher;
pub mod codec;
pub mod memory;
pub mod engine;

pub use codec::{decode_trace, TraceFailure, TraceResult};
pub use descriptor::HostFunction;
pub use dispatcher::Dispatcher;
pub use engine::{execute_binary, WasmEngine};
pub use error::BridgeError;
pub use memory::MemoryAccessor;
pub use record::{EngineRecord, LogSubscriber};
pub use registry::EngineRegistry;

pub use tracebridge_hostapi::{CallShape, EngineId, FatalError, ForeignEngine};
