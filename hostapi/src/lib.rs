//! `tracebridge-hostapi`: boundary contract between the host bridge and a
//! foreign WASM execution engine.
//!
//! This crate defines what both sides of the engine boundary agree on:
//!
//! - `EngineId`: the process-wide engine identifier
//! - `CallShape`: width and arity of a host import
//! - `EntryPoint` / `LogEntry`: the global functions an engine calls back into
//! - `ForeignEngine` trait: the engine operations the bridge drives
//! - `TraceStatus`: the `error:<code>` status convention for trace payloads
//! - `FatalError` / `EngineError`: the two error tiers crossing the boundary
//! - `MemEngine`: in-memory `ForeignEngine` for testing

pub mod error;
pub mod types;
pub mod traits;
pub mod mem_engine;

// Re-export commonly used types at the crate root.
pub use error::{EngineError, FatalError};
pub use types::{
    CallShape, EngineId, EntryPoint, I32Entry, I64Entry, LogEntry, NotifyEntry, TraceStatus,
    STATUS_MAX_LEN, STATUS_PREFIX,
};
pub use traits::ForeignEngine;
pub use mem_engine::MemEngine;
