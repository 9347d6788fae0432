//! Import binding via Wasmtime linker.
//!
//! Every import a module declares is bound either to a registered entry
//! point or to one of the built-in halting imports. A bound import:
//! 1. Prepends the engine-id marker to the guest's arguments
//! 2. Calls the entry point registered for its shape
//! 3. Writes the i32 result back, if the shape has one
//! 4. Appends the call to the trace log
//!
//! A fatal error from an entry point traps the guest and aborts the trace.

use std::collections::BTreeMap;

use tracebridge_hostapi::{CallShape, EngineError, EngineId, EntryPoint};
use wasmtime::{Caller, Engine, ExternType, FuncType, Linker, Module, Val, ValType};

use crate::config::RuntimeConfig;
use crate::error::Halt;
use crate::trace::TraceState;

/// An import bound through `register_import`.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub shape: CallShape,
    pub entry: EntryPoint,
}

/// Wasmtime function type a shape presents to the guest.
pub fn func_type(engine: &Engine, shape: CallShape) -> FuncType {
    let param = if shape.is_wide() {
        ValType::I64
    } else {
        ValType::I32
    };
    let params = std::iter::repeat(param).take(shape.param_count());
    let results = if shape.returns_value() {
        vec![ValType::I32]
    } else {
        vec![]
    };
    FuncType::new(engine, params, results)
}

/// Bind every import of `module` into `linker`.
///
/// Imports without a binding must be the configured stop or revert
/// import; anything else is a link error.
pub fn bind_imports(
    linker: &mut Linker<TraceState>,
    module: &Module,
    bindings: &BTreeMap<String, Binding>,
    config: &RuntimeConfig,
) -> Result<(), EngineError> {
    for import in module.imports() {
        let name = import.name();
        if let Some(binding) = bindings.get(name) {
            bind_entry(linker, name, *binding, config)?;
            continue;
        }

        let halt = if name == config.stop_import {
            Halt::Stop
        } else if name == config.revert_import {
            Halt::Revert
        } else {
            return Err(EngineError::Link(format!(
                "import '{}::{}' has no registered host function",
                import.module(),
                name
            )));
        };
        let ExternType::Func(ty) = import.ty() else {
            return Err(EngineError::Link(format!(
                "import '{}::{}' must be a function",
                import.module(),
                name
            )));
        };
        linker
            .func_new(&config.import_module, name, ty, move |_, _, _| {
                Err(anyhow::Error::new(halt))
            })
            .map_err(|e| EngineError::Link(format!("bind '{}': {}", name, e)))?;
    }
    Ok(())
}

/// Raw argument buffer: the engine marker followed by the guest's i32 args.
fn raw_i32(engine: EngineId, params: &[Val]) -> Vec<i32> {
    std::iter::once(engine.marker_i32())
        .chain(params.iter().filter_map(Val::i32))
        .collect()
}

/// Raw argument buffer: the engine marker followed by the guest's i64 args.
fn raw_i64(engine: EngineId, params: &[Val]) -> Vec<i64> {
    std::iter::once(engine.marker_i64())
        .chain(params.iter().filter_map(Val::i64))
        .collect()
}

fn widen(args: &[i32]) -> Vec<i64> {
    args.iter().map(|&a| i64::from(a)).collect()
}

fn bind_entry(
    linker: &mut Linker<TraceState>,
    name: &str,
    binding: Binding,
    config: &RuntimeConfig,
) -> Result<(), EngineError> {
    let ty = func_type(linker.engine(), binding.shape);
    let import = name.to_string();
    linker
        .func_new(
            &config.import_module,
            name,
            ty,
            move |mut caller: Caller<'_, TraceState>, params: &[Val], results: &mut [Val]| {
                let engine = caller.data().engine;
                let (args, result) = match binding.entry {
                    EntryPoint::Notify(entry) => {
                        let raw = raw_i32(engine, params);
                        entry(engine, &import, &raw)?;
                        (widen(&raw[1..]), None)
                    }
                    EntryPoint::I32(entry) => {
                        let raw = raw_i32(engine, params);
                        let value = entry(engine, &import, &raw)?;
                        (widen(&raw[1..]), Some(value))
                    }
                    EntryPoint::I64(entry) => {
                        let raw = raw_i64(engine, params);
                        let value = entry(engine, &import, &raw)?;
                        (raw[1..].to_vec(), Some(value))
                    }
                };
                if let (Some(value), Some(slot)) = (result, results.first_mut()) {
                    *slot = Val::I32(value);
                }
                caller.data_mut().record_call(&import, args, result)?;
                Ok(())
            },
        )
        .map_err(|e| EngineError::Link(format!("bind '{}': {}", name, e)))?;
    Ok(())
}
