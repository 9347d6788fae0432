//! Dispatcher: routes foreign-engine callbacks to host functions.
//!
//! Every raw argument buffer arrives with the engine-id marker in its first
//! slot. A call resolves in a fixed order:
//! 1. Engine record (fatal if the id is unknown)
//! 2. Host function (fatal if the name is unregistered)
//! 3. Marker (fatal if missing or naming another engine)
//! 4. Declared shape against call path and slot count (fatal on mismatch)
//!
//! Only then is the callback invoked, with the marker stripped. No lock is
//! held while a callback or log subscriber runs, so both may re-enter the
//! bridge.
//!
//! The free functions at the bottom are the global entry points handed to
//! the foreign engine; they resolve against the process-wide registry and
//! report fatal errors before returning them.

use std::sync::Arc;

use tracing::trace;
use tracebridge_hostapi::{CallShape, EngineId, EntryPoint, FatalError};

use crate::descriptor::HostFunction;
use crate::fatal;
use crate::registry::{self, EngineRegistry};

/// Resolves callbacks against one registry.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    registry: &'a EngineRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a EngineRegistry) -> Self {
        Self { registry }
    }

    /// Dispatcher over the process-wide registry.
    pub fn global() -> Dispatcher<'static> {
        Dispatcher::new(registry::global())
    }

    fn resolve(&self, engine: EngineId, name: &str) -> Result<Arc<HostFunction>, FatalError> {
        let record = self
            .registry
            .lookup(engine)
            .ok_or(FatalError::UnknownEngine(engine))?;
        record.host_function(name)
    }

    /// Fixed-arity notification call.
    pub fn notify(&self, engine: EngineId, name: &str, raw: &[i32]) -> Result<(), FatalError> {
        let function = self.resolve(engine, name)?;
        let args = strip_marker(engine, name, raw, engine.marker_i32())?;
        trace!(%engine, function = name, ?args, "dispatch notify");

        match (&*function, args) {
            (HostFunction::Notify1(callback), &[a]) => callback(a),
            (HostFunction::Notify2(callback), &[a, b]) => callback(a, b),
            (HostFunction::Notify3(callback), &[a, b, c]) => callback(a, b, c),
            (declared, _) => {
                return Err(shape_mismatch(
                    engine,
                    name,
                    declared.shape(),
                    CallShape::Notify { arity: args.len() },
                ))
            }
        }
        Ok(())
    }

    /// i32-parameter call returning an i32.
    pub fn call_i32(&self, engine: EngineId, name: &str, raw: &[i32]) -> Result<i32, FatalError> {
        let function = self.resolve(engine, name)?;
        let args = strip_marker(engine, name, raw, engine.marker_i32())?;
        trace!(%engine, function = name, ?args, "dispatch i32");

        match &*function {
            HostFunction::I32 { params, callback } if *params == args.len() => Ok(callback(args)),
            declared => Err(shape_mismatch(
                engine,
                name,
                declared.shape(),
                CallShape::I32 { params: args.len() },
            )),
        }
    }

    /// i64-parameter call returning an i32.
    pub fn call_i64(&self, engine: EngineId, name: &str, raw: &[i64]) -> Result<i32, FatalError> {
        let function = self.resolve(engine, name)?;
        let args = strip_marker(engine, name, raw, engine.marker_i64())?;
        trace!(%engine, function = name, ?args, "dispatch i64");

        match &*function {
            HostFunction::I64 { params, callback } if *params == args.len() => Ok(callback(args)),
            declared => Err(shape_mismatch(
                engine,
                name,
                declared.shape(),
                CallShape::I64 { params: args.len() },
            )),
        }
    }

    /// Deliver an execution-log item to the engine's subscriber, if any.
    pub fn log_item(&self, engine: EngineId, fragment: &[u8]) -> Result<(), FatalError> {
        let record = self
            .registry
            .lookup(engine)
            .ok_or(FatalError::UnknownEngine(engine))?;
        let item =
            std::str::from_utf8(fragment).map_err(|_| FatalError::MalformedLogItem(engine))?;
        match record.log_subscriber() {
            Some(subscriber) => subscriber(item),
            None => trace!(%engine, "log item without subscriber"),
        }
        Ok(())
    }
}

fn strip_marker<'r, T>(
    engine: EngineId,
    name: &str,
    raw: &'r [T],
    marker: T,
) -> Result<&'r [T], FatalError>
where
    T: Copy + PartialEq + Into<i64>,
{
    match raw.split_first() {
        Some((first, rest)) if *first == marker => Ok(rest),
        found => Err(FatalError::MarkerMismatch {
            engine,
            name: name.to_string(),
            found: found.map(|(first, _)| (*first).into()),
        }),
    }
}

fn shape_mismatch(
    engine: EngineId,
    name: &str,
    declared: CallShape,
    invoked: CallShape,
) -> FatalError {
    FatalError::ShapeMismatch {
        engine,
        name: name.to_string(),
        declared,
        invoked,
    }
}

// ── Global entry points ──

pub fn notify_entry(engine: EngineId, name: &str, raw: &[i32]) -> Result<(), FatalError> {
    Dispatcher::global()
        .notify(engine, name, raw)
        .map_err(fatal::raise)
}

pub fn i32_entry(engine: EngineId, name: &str, raw: &[i32]) -> Result<i32, FatalError> {
    Dispatcher::global()
        .call_i32(engine, name, raw)
        .map_err(fatal::raise)
}

pub fn i64_entry(engine: EngineId, name: &str, raw: &[i64]) -> Result<i32, FatalError> {
    Dispatcher::global()
        .call_i64(engine, name, raw)
        .map_err(fatal::raise)
}

pub fn log_entry(engine: EngineId, fragment: &[u8]) -> Result<(), FatalError> {
    Dispatcher::global()
        .log_item(engine, fragment)
        .map_err(fatal::raise)
}

/// The global entry point serving imports of `shape`.
pub fn entry_point(shape: CallShape) -> EntryPoint {
    match shape {
        CallShape::Notify { .. } => EntryPoint::Notify(notify_entry),
        CallShape::I32 { .. } => EntryPoint::I32(i32_entry),
        CallShape::I64 { .. } => EntryPoint::I64(i64_entry),
    }
}
