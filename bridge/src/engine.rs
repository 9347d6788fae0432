//! `WasmEngine`: the caller-facing handle for one foreign engine.
//!
//! Creating a handle allocates an engine in the foreign engine and inserts
//! its record into the process-wide registry. Host functions are recorded
//! in the bridge first and then bound in the foreign engine to the global
//! entry point for their shape.

use std::sync::Arc;

use tracing::{debug, warn};
use tracebridge_hostapi::{EngineId, FatalError, ForeignEngine};

use crate::codec::{decode_trace, TraceResult};
use crate::descriptor::HostFunction;
use crate::dispatcher;
use crate::error::BridgeError;
use crate::fatal;
use crate::memory::MemoryAccessor;
use crate::record::EngineRecord;
use crate::registry;

#[derive(Clone)]
pub struct WasmEngine {
    id: EngineId,
    record: Arc<EngineRecord>,
    foreign: Arc<dyn ForeignEngine>,
}

impl WasmEngine {
    /// Create a new engine in `foreign` and register it.
    ///
    /// If the registry already holds the id `foreign` returned, this is fatal
    /// `DuplicateEngine` and the existing record is kept. The engine just
    /// created in `foreign` stays behind unused, since `ForeignEngine` has no
    /// operation to destroy one.
    pub fn new(foreign: Arc<dyn ForeignEngine>) -> Result<Self, BridgeError> {
        let id = foreign.create_engine()?;
        let record = Arc::new(EngineRecord::new(id));
        if !registry::global().insert(record.clone()) {
            return Err(fatal::raise(FatalError::DuplicateEngine(id)).into());
        }
        debug!(engine = %id, "created engine");
        Ok(Self {
            id,
            record,
            foreign,
        })
    }

    /// Handle for an engine created earlier through [`WasmEngine::new`].
    pub fn attach(foreign: Arc<dyn ForeignEngine>, id: EngineId) -> Result<Self, BridgeError> {
        let record = registry::global()
            .lookup(id)
            .ok_or(BridgeError::EngineNotFound(id))?;
        Ok(Self {
            id,
            record,
            foreign,
        })
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn set_wasm_binary(&self, wasm: &[u8]) -> Result<(), BridgeError> {
        self.foreign.set_binary(self.id, wasm)?;
        Ok(())
    }

    /// Run the installed binary and decode its trace.
    ///
    /// Halting outcomes come back as `TraceResult::Failure`; fatal binding
    /// errors raised during execution come back as `BridgeError::Fatal`.
    pub fn compute_trace(&self) -> Result<TraceResult, BridgeError> {
        let payload = self.foreign.compute_trace(self.id)?;
        let result = decode_trace(payload)?;
        match &result {
            TraceResult::Success(payload) => {
                debug!(engine = %self.id, bytes = payload.len(), "computed trace")
            }
            TraceResult::Failure(failure) => {
                debug!(engine = %self.id, %failure, "trace failed")
            }
        }
        Ok(result)
    }

    pub fn memory(&self) -> MemoryAccessor<'_> {
        MemoryAccessor::new(self.foreign.as_ref(), self.id)
    }

    /// Copy of the engine's full linear memory.
    pub fn memory_data(&self) -> Result<Vec<u8>, BridgeError> {
        self.memory().read_snapshot()
    }

    /// Record a memory change to replay before the next trace.
    pub fn trace_memory_change(
        &self,
        offset: u32,
        length: u32,
        data: &[u8],
    ) -> Result<(), BridgeError> {
        self.memory().patch_range(offset, length, data)
    }

    /// Register `function` as import `name`.
    ///
    /// Registering a name twice, or a foreign engine refusing the binding,
    /// is fatal. A refused name is dropped from the record again, so the
    /// bridge and the foreign engine keep the same set of imports.
    pub fn register_host_fn(&self, name: &str, function: HostFunction) -> Result<(), BridgeError> {
        let shape = self.record.register(name, function).map_err(fatal::raise)?;
        let entry = dispatcher::entry_point(shape);
        if !self.foreign.register_import(self.id, name, shape, entry) {
            self.record.discard(name);
            warn!(engine = %self.id, function = name, %shape, "foreign engine rejected import");
            return Err(fatal::raise(FatalError::ImportRejected {
                engine: self.id,
                name: name.to_string(),
                shape,
            })
            .into());
        }
        debug!(engine = %self.id, function = name, %shape, "registered host function");
        Ok(())
    }

    pub fn register_host_fn_i32(
        &self,
        name: &str,
        params: usize,
        f: impl Fn(&[i32]) -> i32 + Send + Sync + 'static,
    ) -> Result<(), BridgeError> {
        self.register_host_fn(name, HostFunction::i32(params, f))
    }

    pub fn register_host_fn_i64(
        &self,
        name: &str,
        params: usize,
        f: impl Fn(&[i64]) -> i32 + Send + Sync + 'static,
    ) -> Result<(), BridgeError> {
        self.register_host_fn(name, HostFunction::i64(params, f))
    }

    /// Install or replace the log subscriber.
    pub fn subscribe_logs(
        &self,
        subscriber: impl Fn(&str) + Send + Sync + 'static,
    ) -> Result<(), BridgeError> {
        self.record.set_log_subscriber(Arc::new(subscriber));
        if !self
            .foreign
            .register_log_listener(self.id, dispatcher::log_entry)
        {
            self.record.clear_log_subscriber();
            return Err(fatal::raise(FatalError::LogListenerRejected(self.id)).into());
        }
        Ok(())
    }

    /// Remove the log subscriber. Later log items are dropped.
    pub fn unsubscribe_logs(&self) {
        self.record.clear_log_subscriber();
    }

    /// Names of the registered host functions, sorted.
    pub fn host_functions(&self) -> Vec<String> {
        self.record.function_names()
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("id", &self.id)
            .field("record", &self.record)
            .finish()
    }
}

/// One-shot execution of `wasm` in a throwaway foreign engine.
pub fn execute_binary(
    foreign: &dyn ForeignEngine,
    wasm: &[u8],
) -> Result<TraceResult, BridgeError> {
    let payload = foreign.execute_binary(wasm)?;
    decode_trace(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracebridge_hostapi::{CallShape, EngineError, EntryPoint, LogEntry, MemEngine};

    fn engine() -> (Arc<MemEngine>, WasmEngine) {
        let foreign = Arc::new(MemEngine::new());
        let engine = WasmEngine::new(foreign.clone()).unwrap();
        (foreign, engine)
    }

    #[test]
    fn test_new_registers_record() {
        let (_, engine) = engine();
        assert!(registry::global().contains(engine.id()));
    }

    /// Foreign engine that hands out the same id on every creation.
    struct FixedId {
        inner: MemEngine,
        id: EngineId,
    }

    impl ForeignEngine for FixedId {
        fn create_engine(&self) -> Result<EngineId, EngineError> {
            Ok(self.id)
        }

        fn set_binary(&self, engine: EngineId, wasm: &[u8]) -> Result<(), EngineError> {
            self.inner.set_binary(engine, wasm)
        }

        fn compute_trace(&self, engine: EngineId) -> Result<Vec<u8>, EngineError> {
            self.inner.compute_trace(engine)
        }

        fn memory_snapshot(&self, engine: EngineId) -> Result<Vec<u8>, EngineError> {
            self.inner.memory_snapshot(engine)
        }

        fn patch_memory(
            &self,
            engine: EngineId,
            offset: u32,
            length: u32,
            data: &[u8],
        ) -> Result<(), EngineError> {
            self.inner.patch_memory(engine, offset, length, data)
        }

        fn register_import(
            &self,
            engine: EngineId,
            name: &str,
            shape: CallShape,
            entry: EntryPoint,
        ) -> bool {
            self.inner.register_import(engine, name, shape, entry)
        }

        fn register_log_listener(&self, engine: EngineId, entry: LogEntry) -> bool {
            self.inner.register_log_listener(engine, entry)
        }
    }

    #[test]
    fn test_reused_engine_id_is_fatal_and_keeps_record() {
        let inner = MemEngine::new();
        let id = inner.create_engine().unwrap();
        let foreign: Arc<dyn ForeignEngine> = Arc::new(FixedId { inner, id });

        let first = WasmEngine::new(foreign.clone()).unwrap();
        first.register_host_fn_i32("_evm_gas", 0, |_| 1).unwrap();

        let err = WasmEngine::new(foreign).unwrap_err();
        assert_eq!(err.as_fatal(), Some(&FatalError::DuplicateEngine(id)));
        assert_eq!(
            registry::global().lookup(id).unwrap().function_names(),
            vec!["_evm_gas"]
        );
    }

    #[test]
    fn test_attach() {
        let (foreign, engine) = engine();
        let attached = WasmEngine::attach(foreign.clone(), engine.id()).unwrap();
        assert_eq!(attached.id(), engine.id());

        let err = WasmEngine::attach(foreign, EngineId(u32::MAX)).unwrap_err();
        assert!(matches!(err, BridgeError::EngineNotFound(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_register_binds_import_with_shape() {
        let (foreign, engine) = engine();
        engine
            .register_host_fn_i64("_evm_wide", 2, |_| 0)
            .unwrap();
        assert_eq!(
            foreign.imports(engine.id()),
            vec![("_evm_wide".to_string(), CallShape::I64 { params: 2 })]
        );
    }

    #[test]
    fn test_compute_trace_decodes() {
        let (foreign, engine) = engine();
        engine.set_wasm_binary(b"\0asm").unwrap();
        foreign.set_trace_output(engine.id(), b"error:1".to_vec());
        assert_eq!(
            engine.compute_trace().unwrap(),
            TraceResult::Failure(crate::codec::TraceFailure::OutOfGas)
        );
    }

    #[test]
    fn test_compute_trace_without_binary() {
        let (_, engine) = engine();
        let err = engine.compute_trace().unwrap_err();
        assert!(!err.is_fatal());
    }
}
