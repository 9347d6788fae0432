//! The foreign execution engine boundary.
//!
//! `ForeignEngine` is everything the bridge needs from an engine: identity
//! allocation, binary installation, trace computation, memory access, and
//! import binding through global entry points. Implementations own WASM
//! execution entirely; the bridge treats them as a black box.

use crate::error::EngineError;
use crate::types::{CallShape, EngineId, EntryPoint, LogEntry};

/// A foreign WASM execution engine.
///
/// Every method is keyed by `EngineId`. Implementations must be callable
/// from any thread and must tolerate re-entry from entry points invoked
/// while `compute_trace` is running.
pub trait ForeignEngine: Send + Sync {
    /// Create a new engine instance and return its identifier.
    ///
    /// Identifiers come from [`EngineId::allocate`].
    fn create_engine(&self) -> Result<EngineId, EngineError>;

    /// Install (or replace) the WASM binary an engine executes.
    fn set_binary(&self, engine: EngineId, wasm: &[u8]) -> Result<(), EngineError>;

    /// Execute the installed binary and return the trace payload.
    ///
    /// Execution failures are reported in-band as a short status payload
    /// (see [`TraceStatus::encode`](crate::TraceStatus::encode)), not as `Err`.
    fn compute_trace(&self, engine: EngineId) -> Result<Vec<u8>, EngineError>;

    /// Copy of the engine's full linear memory.
    fn memory_snapshot(&self, engine: EngineId) -> Result<Vec<u8>, EngineError>;

    /// Record and apply a replacement of `length` bytes at `offset`.
    ///
    /// Out-of-bounds ranges are reported, never clamped.
    fn patch_memory(
        &self,
        engine: EngineId,
        offset: u32,
        length: u32,
        data: &[u8],
    ) -> Result<(), EngineError>;

    /// Bind import `name` to `entry` with the given shape.
    ///
    /// Returns false if the engine is unknown or `entry` cannot serve `shape`.
    fn register_import(
        &self,
        engine: EngineId,
        name: &str,
        shape: CallShape,
        entry: EntryPoint,
    ) -> bool;

    /// Arm execution-log notifications for an engine. Idempotent.
    fn register_log_listener(&self, engine: EngineId, entry: LogEntry) -> bool;

    /// One-shot execution: fresh engine, install `wasm`, compute its trace.
    fn execute_binary(&self, wasm: &[u8]) -> Result<Vec<u8>, EngineError> {
        let engine = self.create_engine()?;
        self.set_binary(engine, wasm)?;
        self.compute_trace(engine)
    }
}
