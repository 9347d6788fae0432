//! In-memory foreign engine for testing.
//!
//! `MemEngine` implements `ForeignEngine` without executing any WASM. Tests
//! script its trace output and play the foreign side by hand: `call_*`
//! invokes a bound import through its entry point exactly as a real engine
//! would (marker slot first), and `emit_log` fires the log listener.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::error::{EngineError, FatalError};
use crate::traits::ForeignEngine;
use crate::types::{CallShape, EngineId, EntryPoint, LogEntry};

/// Default linear memory size of a fresh engine (one WASM page).
pub const DEFAULT_MEMORY_SIZE: usize = 65536;

struct MemSlot {
    binary: Option<Vec<u8>>,
    memory: Vec<u8>,
    imports: BTreeMap<String, (CallShape, EntryPoint)>,
    log_entry: Option<LogEntry>,
    trace_output: Vec<u8>,
    reject_imports: bool,
}

impl MemSlot {
    fn new(memory_size: usize) -> Self {
        Self {
            binary: None,
            memory: vec![0; memory_size],
            imports: BTreeMap::new(),
            log_entry: None,
            trace_output: b"{}".to_vec(),
            reject_imports: false,
        }
    }
}

/// Scriptable in-memory `ForeignEngine`.
pub struct MemEngine {
    memory_size: usize,
    slots: Mutex<HashMap<EngineId, MemSlot>>,
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemEngine {
    /// Create an engine whose instances start with one page of zeroed memory.
    pub fn new() -> Self {
        Self::with_memory_size(DEFAULT_MEMORY_SIZE)
    }

    /// Create an engine whose instances start with `memory_size` zero bytes.
    pub fn with_memory_size(memory_size: usize) -> Self {
        Self {
            memory_size,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Script the payload `compute_trace` returns for `engine`.
    pub fn set_trace_output(&self, engine: EngineId, payload: Vec<u8>) {
        if let Some(slot) = self.slots.lock().get_mut(&engine) {
            slot.trace_output = payload;
        }
    }

    /// Make `register_import` fail for `engine`.
    pub fn reject_imports(&self, engine: EngineId) {
        if let Some(slot) = self.slots.lock().get_mut(&engine) {
            slot.reject_imports = true;
        }
    }

    /// The installed binary, if any.
    pub fn binary(&self, engine: EngineId) -> Option<Vec<u8>> {
        self.slots.lock().get(&engine).and_then(|s| s.binary.clone())
    }

    /// Names and shapes of the imports bound on `engine`.
    pub fn imports(&self, engine: EngineId) -> Vec<(String, CallShape)> {
        self.slots
            .lock()
            .get(&engine)
            .map(|s| s.imports.iter().map(|(n, (shape, _))| (n.clone(), *shape)).collect())
            .unwrap_or_default()
    }

    /// Whether the log listener has been armed for `engine`.
    pub fn log_listener_armed(&self, engine: EngineId) -> bool {
        self.slots
            .lock()
            .get(&engine)
            .is_some_and(|s| s.log_entry.is_some())
    }

    /// Invoke a bound notification import as the WASM module would.
    pub fn call_notify(
        &self,
        engine: EngineId,
        name: &str,
        args: &[i32],
    ) -> Result<(), FatalError> {
        match self.bound_entry(engine, name)? {
            EntryPoint::Notify(entry) => entry(engine, name, &with_marker_i32(engine, args)),
            EntryPoint::I32(entry) => {
                entry(engine, name, &with_marker_i32(engine, args)).map(|_| ())
            }
            EntryPoint::I64(entry) => {
                entry(engine, name, &with_marker_i64(engine, args)).map(|_| ())
            }
        }
    }

    /// Invoke a bound i32 import as the WASM module would.
    pub fn call_i32(&self, engine: EngineId, name: &str, args: &[i32]) -> Result<i32, FatalError> {
        match self.bound_entry(engine, name)? {
            EntryPoint::Notify(entry) => {
                entry(engine, name, &with_marker_i32(engine, args)).map(|_| 0)
            }
            EntryPoint::I32(entry) => entry(engine, name, &with_marker_i32(engine, args)),
            EntryPoint::I64(entry) => entry(engine, name, &with_marker_i64(engine, args)),
        }
    }

    /// Invoke a bound i64 import as the WASM module would.
    pub fn call_i64(&self, engine: EngineId, name: &str, args: &[i64]) -> Result<i32, FatalError> {
        let mut raw = Vec::with_capacity(args.len() + 1);
        raw.push(engine.marker_i64());
        raw.extend_from_slice(args);
        match self.bound_entry(engine, name)? {
            EntryPoint::I64(entry) => entry(engine, name, &raw),
            EntryPoint::Notify(entry) => {
                let narrow: Vec<i32> = raw.iter().map(|v| *v as i32).collect();
                entry(engine, name, &narrow).map(|_| 0)
            }
            EntryPoint::I32(entry) => {
                let narrow: Vec<i32> = raw.iter().map(|v| *v as i32).collect();
                entry(engine, name, &narrow)
            }
        }
    }

    /// Append an item to the execution log, notifying the listener if armed.
    pub fn emit_log(&self, engine: EngineId, fragment: &[u8]) -> Result<(), FatalError> {
        let entry = self.slots.lock().get(&engine).and_then(|s| s.log_entry);
        match entry {
            Some(entry) => entry(engine, fragment),
            None => Ok(()),
        }
    }

    // The slot lock is released before the entry point runs, so callbacks may
    // re-enter this engine.
    fn bound_entry(&self, engine: EngineId, name: &str) -> Result<EntryPoint, FatalError> {
        let slots = self.slots.lock();
        let slot = slots.get(&engine).ok_or(FatalError::UnknownEngine(engine))?;
        slot.imports
            .get(name)
            .map(|(_, entry)| *entry)
            .ok_or_else(|| FatalError::UnknownFunction {
                engine,
                name: name.to_string(),
            })
    }
}

fn with_marker_i32(engine: EngineId, args: &[i32]) -> Vec<i32> {
    let mut raw = Vec::with_capacity(args.len() + 1);
    raw.push(engine.marker_i32());
    raw.extend_from_slice(args);
    raw
}

fn with_marker_i64(engine: EngineId, args: &[i32]) -> Vec<i64> {
    let mut raw = Vec::with_capacity(args.len() + 1);
    raw.push(engine.marker_i64());
    raw.extend(args.iter().map(|v| i64::from(*v)));
    raw
}

impl ForeignEngine for MemEngine {
    fn create_engine(&self) -> Result<EngineId, EngineError> {
        let engine = EngineId::allocate();
        self.slots.lock().insert(engine, MemSlot::new(self.memory_size));
        Ok(engine)
    }

    fn set_binary(&self, engine: EngineId, wasm: &[u8]) -> Result<(), EngineError> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&engine).ok_or(EngineError::UnknownEngine(engine))?;
        slot.binary = Some(wasm.to_vec());
        Ok(())
    }

    fn compute_trace(&self, engine: EngineId) -> Result<Vec<u8>, EngineError> {
        let slots = self.slots.lock();
        let slot = slots.get(&engine).ok_or(EngineError::UnknownEngine(engine))?;
        if slot.binary.is_none() {
            return Err(EngineError::NoBinary(engine));
        }
        Ok(slot.trace_output.clone())
    }

    fn memory_snapshot(&self, engine: EngineId) -> Result<Vec<u8>, EngineError> {
        let slots = self.slots.lock();
        let slot = slots.get(&engine).ok_or(EngineError::UnknownEngine(engine))?;
        Ok(slot.memory.clone())
    }

    fn patch_memory(
        &self,
        engine: EngineId,
        offset: u32,
        length: u32,
        data: &[u8],
    ) -> Result<(), EngineError> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&engine).ok_or(EngineError::UnknownEngine(engine))?;
        if data.len() != length as usize {
            return Err(EngineError::PatchLengthMismatch {
                length,
                data_len: data.len(),
            });
        }
        let size = slot.memory.len();
        let start = offset as usize;
        let end = start
            .checked_add(length as usize)
            .filter(|end| *end <= size)
            .ok_or(EngineError::MemoryOutOfBounds { offset, length, size })?;
        slot.memory[start..end].copy_from_slice(data);
        Ok(())
    }

    fn register_import(
        &self,
        engine: EngineId,
        name: &str,
        shape: CallShape,
        entry: EntryPoint,
    ) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&engine) {
            Some(slot) if !slot.reject_imports && entry.accepts(shape) => {
                slot.imports.insert(name.to_string(), (shape, entry));
                true
            }
            _ => false,
        }
    }

    fn register_log_listener(&self, engine: EngineId, entry: LogEntry) -> bool {
        match self.slots.lock().get_mut(&engine) {
            Some(slot) => {
                slot.log_entry = Some(entry);
                true
            }
            None => false,
        }
    }
}
