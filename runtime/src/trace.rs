//! Per-execution trace state held in the Wasmtime Store.
//!
//! `TraceState` lives inside `Store<TraceState>` for the duration of one
//! `compute_trace` call. It accumulates the trace document (initial memory,
//! applied patches, host-call log) and forwards each host-call log item to
//! the engine's log listener as a JSON fragment.

use serde::{Serialize, Serializer};
use tracebridge_hostapi::{EngineError, EngineId, FatalError, LogEntry};
use wasmtime::StoreLimits;

use crate::memory::MemoryPatch;

fn serialize_hex<T, S>(data: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(data.as_ref()))
}

/// A region of linear memory, hex-encoded in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub offset: u32,
    pub len: u32,
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
}

impl MemoryRegion {
    pub fn new(offset: u32, data: &[u8]) -> Self {
        Self {
            offset,
            len: data.len() as u32,
            data: data.to_vec(),
        }
    }
}

impl From<&MemoryPatch> for MemoryRegion {
    fn from(patch: &MemoryPatch) -> Self {
        Self::new(patch.offset, &patch.data)
    }
}

/// One host import call made by the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCall {
    /// Position in the execution log.
    pub index: u32,
    pub import: String,
    /// Arguments as passed by the guest, without the engine marker.
    pub params: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<i32>,
}

/// The trace document returned by `compute_trace`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    /// Non-zero regions of memory right after instantiation.
    pub global_memory: Vec<MemoryRegion>,
    /// Recorded patches, in the order they were applied.
    pub memory_changes: Vec<MemoryRegion>,
    pub logs: Vec<HostCall>,
}

impl Trace {
    pub fn to_json(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}

/// Per-execution mutable state held in the Wasmtime `Store`.
pub struct TraceState {
    pub engine: EngineId,
    pub trace: Trace,
    /// Listener notified of each log item, if armed.
    pub log_entry: Option<LogEntry>,
    pub limits: StoreLimits,
}

impl TraceState {
    pub fn new(engine: EngineId, log_entry: Option<LogEntry>, limits: StoreLimits) -> Self {
        Self {
            engine,
            trace: Trace::default(),
            log_entry,
            limits,
        }
    }

    /// Append a host call to the log and notify the listener.
    pub fn record_call(
        &mut self,
        import: &str,
        params: Vec<i64>,
        result: Option<i32>,
    ) -> Result<(), FatalError> {
        let item = HostCall {
            index: self.trace.logs.len() as u32,
            import: import.to_string(),
            params,
            result,
        };
        let fragment = match self.log_entry {
            Some(_) => serde_json::to_vec(&item).ok(),
            None => None,
        };
        self.trace.logs.push(item);

        if let (Some(entry), Some(fragment)) = (self.log_entry, fragment) {
            entry(self.engine, &fragment)?;
        }
        Ok(())
    }
}
