//! Trace runtime: Wasmtime engine, per-engine slots, and trace execution.
//!
//! `TraceRuntime` is the Wasmtime-backed [`ForeignEngine`]. Each engine id
//! owns a slot holding its compiled module, import bindings, log listener,
//! recorded memory patches, and a linear-memory image. Every
//! `compute_trace` call runs in a fresh instance:
//!
//! 1. Bind imports and instantiate
//! 2. Record the non-zero regions of initial memory
//! 3. Replay recorded patches
//! 4. Run the entry export
//! 5. Serialize the trace, or encode the halting status
//!
//! Slot locks are only held to copy an execution plan out of the slot or to
//! store results back, never while guest code runs, so entry points may
//! call back into the runtime.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use wasmtime::{Config, Engine, Instance, Linker, Module, Store, StoreLimitsBuilder};

use tracebridge_hostapi::{
    CallShape, EngineError, EngineId, EntryPoint, ForeignEngine, LogEntry,
};

use crate::config::RuntimeConfig;
use crate::error::{classify_trap, is_execution_error};
use crate::linker::{bind_imports, Binding};
use crate::memory::{non_zero_runs, MemoryPatch};
use crate::trace::{MemoryRegion, TraceState};
use crate::validation::validate_module;

/// Name of the exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";

#[derive(Default)]
struct EngineSlot {
    module: Option<Module>,
    bindings: BTreeMap<String, Binding>,
    log_entry: Option<LogEntry>,
    patches: Vec<MemoryPatch>,
    /// Current memory image, captured lazily.
    image: Option<Vec<u8>>,
}

/// Everything one execution needs, copied out of a slot.
struct Plan {
    engine: EngineId,
    module: Module,
    bindings: BTreeMap<String, Binding>,
    log_entry: Option<LogEntry>,
    patches: Vec<MemoryPatch>,
}

/// Result of one traced execution.
struct Execution {
    payload: Vec<u8>,
    /// Memory at the end of execution; `None` when the module has no memory.
    memory: Option<Vec<u8>>,
}

/// The Wasmtime-backed trace engine.
pub struct TraceRuntime {
    engine: Engine,
    config: RuntimeConfig,
    slots: Mutex<HashMap<EngineId, Arc<Mutex<EngineSlot>>>>,
}

impl TraceRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self, EngineError> {
        let engine = create_engine(&config)?;
        Ok(Self {
            engine,
            config,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn slot(&self, engine: EngineId) -> Result<Arc<Mutex<EngineSlot>>, EngineError> {
        self.slots
            .lock()
            .get(&engine)
            .cloned()
            .ok_or(EngineError::UnknownEngine(engine))
    }

    fn plan(&self, engine: EngineId) -> Result<Plan, EngineError> {
        let slot = self.slot(engine)?;
        let slot = slot.lock();
        let module = slot.module.clone().ok_or(EngineError::NoBinary(engine))?;
        Ok(Plan {
            engine,
            module,
            bindings: slot.bindings.clone(),
            log_entry: slot.log_entry,
            patches: slot.patches.clone(),
        })
    }

    fn new_store(&self, plan: &Plan) -> Result<Store<TraceState>, EngineError> {
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory_bytes())
            .build();
        let mut store = Store::new(
            &self.engine,
            TraceState::new(plan.engine, plan.log_entry, limits),
        );
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = self.config.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| EngineError::Link(format!("set fuel: {}", e)))?;
        }
        Ok(store)
    }

    fn linker(&self, plan: &Plan) -> Result<Linker<TraceState>, EngineError> {
        let mut linker = Linker::new(&self.engine);
        bind_imports(&mut linker, &plan.module, &plan.bindings, &self.config)?;
        Ok(linker)
    }

    /// Instantiate `plan` without running the entry export.
    ///
    /// A start function that halts or traps is a link error here.
    fn initial_memory(&self, plan: &Plan) -> Result<Vec<u8>, EngineError> {
        let mut store = self.new_store(plan)?;
        let linker = self.linker(plan)?;
        let instance = linker.instantiate(&mut store, &plan.module).map_err(|e| {
            if !is_execution_error(&e) {
                return EngineError::Link(format!("instantiate: {}", e));
            }
            match classify_trap(e) {
                Err(fatal) => fatal,
                Ok(status) => EngineError::Link(format!(
                    "instantiation halted with status {}",
                    status.as_i32()
                )),
            }
        })?;
        Ok(instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .map(|memory| memory.data(&store).to_vec())
            .unwrap_or_default())
    }

    fn execute(&self, plan: &Plan) -> Result<Execution, EngineError> {
        let mut store = self.new_store(plan)?;
        let linker = self.linker(plan)?;
        let instance = match linker.instantiate(&mut store, &plan.module) {
            Ok(instance) => instance,
            Err(e) if is_execution_error(&e) => {
                let status = classify_trap(e)?;
                return Ok(Execution {
                    payload: status.encode(),
                    memory: None,
                });
            }
            Err(e) => return Err(EngineError::Link(format!("instantiate: {}", e))),
        };

        self.prepare_memory(&mut store, &instance, plan)?;

        let main = instance
            .get_typed_func::<(), ()>(&mut store, &self.config.entry_export)
            .map_err(|e| EngineError::Validation(format!("{}", e)))?;
        let status = match main.call(&mut store, ()) {
            Ok(()) => None,
            Err(e) => Some(classify_trap(e)?),
        };

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .map(|memory| memory.data(&store).to_vec());
        let payload = match status {
            None => store.data().trace.to_json()?,
            Some(status) => {
                debug!(engine = %plan.engine, status = status.as_i32(), "execution halted");
                status.encode()
            }
        };
        Ok(Execution { payload, memory })
    }

    /// Record initial memory into the trace and replay recorded patches.
    fn prepare_memory(
        &self,
        store: &mut Store<TraceState>,
        instance: &Instance,
        plan: &Plan,
    ) -> Result<(), EngineError> {
        let Some(memory) = instance.get_memory(&mut *store, MEMORY_EXPORT) else {
            return match plan.patches.first() {
                Some(patch) => Err(EngineError::MemoryOutOfBounds {
                    offset: patch.offset,
                    length: patch.len(),
                    size: 0,
                }),
                None => Ok(()),
            };
        };

        if self.config.record_global_memory {
            let regions: Vec<MemoryRegion> = {
                let data = memory.data(&*store);
                non_zero_runs(data)
                    .into_iter()
                    .map(|run| MemoryRegion::new(run.start as u32, &data[run]))
                    .collect()
            };
            store.data_mut().trace.global_memory = regions;
        }

        for patch in &plan.patches {
            patch.apply(memory.data_mut(&mut *store))?;
            store
                .data_mut()
                .trace
                .memory_changes
                .push(MemoryRegion::from(patch));
        }
        Ok(())
    }

    /// The engine's memory image, capturing it on first use.
    fn ensure_image(&self, engine: EngineId) -> Result<Arc<Mutex<EngineSlot>>, EngineError> {
        let slot = self.slot(engine)?;
        if slot.lock().image.is_some() {
            return Ok(slot);
        }
        let plan = self.plan(engine)?;
        let image = self.initial_memory(&plan)?;
        slot.lock().image.get_or_insert(image);
        Ok(slot)
    }
}

impl ForeignEngine for TraceRuntime {
    fn create_engine(&self) -> Result<EngineId, EngineError> {
        let engine = EngineId::allocate();
        self.slots
            .lock()
            .insert(engine, Arc::new(Mutex::new(EngineSlot::default())));
        debug!(%engine, "created engine");
        Ok(engine)
    }

    fn set_binary(&self, engine: EngineId, wasm: &[u8]) -> Result<(), EngineError> {
        let slot = self.slot(engine)?;
        let module =
            Module::new(&self.engine, wasm).map_err(|e| EngineError::Compile(format!("{}", e)))?;
        validate_module(&module, &self.config)?;

        let mut slot = slot.lock();
        slot.module = Some(module);
        slot.patches.clear();
        slot.image = None;
        debug!(%engine, bytes = wasm.len(), "installed binary");
        Ok(())
    }

    fn compute_trace(&self, engine: EngineId) -> Result<Vec<u8>, EngineError> {
        let plan = self.plan(engine)?;
        let execution = self.execute(&plan)?;

        if let Some(memory) = execution.memory {
            self.slot(engine)?.lock().image = Some(memory);
        }
        debug!(%engine, bytes = execution.payload.len(), "computed trace");
        Ok(execution.payload)
    }

    fn memory_snapshot(&self, engine: EngineId) -> Result<Vec<u8>, EngineError> {
        let slot = self.ensure_image(engine)?;
        let slot = slot.lock();
        Ok(slot.image.clone().unwrap_or_default())
    }

    fn patch_memory(
        &self,
        engine: EngineId,
        offset: u32,
        length: u32,
        data: &[u8],
    ) -> Result<(), EngineError> {
        let patch = MemoryPatch::new(offset, length, data)?;
        let slot = self.ensure_image(engine)?;
        let mut slot = slot.lock();
        let image = slot.image.get_or_insert_with(Vec::new);
        patch.apply(image)?;
        slot.patches.push(patch);
        Ok(())
    }

    fn register_import(
        &self,
        engine: EngineId,
        name: &str,
        shape: CallShape,
        entry: EntryPoint,
    ) -> bool {
        if !entry.accepts(shape) {
            warn!(%engine, import = name, %shape, "entry point cannot serve import shape");
            return false;
        }
        let Ok(slot) = self.slot(engine) else {
            warn!(%engine, import = name, "import registered for unknown engine");
            return false;
        };
        slot.lock()
            .bindings
            .insert(name.to_string(), Binding { shape, entry });
        debug!(%engine, import = name, %shape, "bound import");
        true
    }

    fn register_log_listener(&self, engine: EngineId, entry: LogEntry) -> bool {
        match self.slot(engine) {
            Ok(slot) => {
                slot.lock().log_entry = Some(entry);
                true
            }
            Err(_) => false,
        }
    }
}

/// Create a Wasmtime engine with deterministic configuration.
fn create_engine(config: &RuntimeConfig) -> Result<Engine, EngineError> {
    let mut wasm_config = Config::new();

    wasm_config.consume_fuel(config.fuel_limit.is_some());

    // Determinism enforcement
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    Engine::new(&wasm_config).map_err(|e| EngineError::Link(format!("engine: {}", e)))
}
