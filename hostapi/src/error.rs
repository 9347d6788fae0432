//! Error types shared across the engine boundary.
//!
//! `FatalError` covers binding-contract violations between the bridge and a
//! foreign engine: they can never be retried and always name the engine and
//! function involved. `EngineError` is what a foreign engine reports for its
//! own operations (unknown engine, bad binary, memory bounds, ...).

use crate::types::{CallShape, EngineId};

/// A divergence between the managed and foreign binding tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    /// The foreign engine presented an id the registry never issued.
    #[error("engine {0} is not registered")]
    UnknownEngine(EngineId),

    /// A foreign engine handed out an id that is already registered.
    #[error("engine {0} is already registered")]
    DuplicateEngine(EngineId),

    #[error("engine {engine}: no host function registered as '{name}'")]
    UnknownFunction { engine: EngineId, name: String },

    #[error("engine {engine}: host function '{name}' is already registered")]
    DuplicateFunction { engine: EngineId, name: String },

    /// The call path taken does not match the declared shape.
    #[error(
        "engine {engine}: host function '{name}' declared as {declared} but invoked as {invoked}"
    )]
    ShapeMismatch {
        engine: EngineId,
        name: String,
        declared: CallShape,
        invoked: CallShape,
    },

    /// The leading marker slot was missing or named another engine.
    #[error("engine {engine}: call to '{name}' carried marker {found:?} instead of the engine id")]
    MarkerMismatch {
        engine: EngineId,
        name: String,
        found: Option<i64>,
    },

    #[error("engine {engine}: foreign engine rejected import '{name}' with shape {shape}")]
    ImportRejected {
        engine: EngineId,
        name: String,
        shape: CallShape,
    },

    #[error("engine {0}: foreign engine rejected the log listener")]
    LogListenerRejected(EngineId),

    /// A log fragment that is not valid UTF-8.
    #[error("engine {0}: log item is not valid UTF-8")]
    MalformedLogItem(EngineId),
}

impl FatalError {
    /// The engine the violation was detected on.
    pub fn engine(&self) -> EngineId {
        match self {
            Self::UnknownEngine(engine)
            | Self::DuplicateEngine(engine)
            | Self::LogListenerRejected(engine)
            | Self::MalformedLogItem(engine) => *engine,
            Self::UnknownFunction { engine, .. }
            | Self::DuplicateFunction { engine, .. }
            | Self::ShapeMismatch { engine, .. }
            | Self::MarkerMismatch { engine, .. }
            | Self::ImportRejected { engine, .. } => *engine,
        }
    }

    /// The host function involved, when there is one.
    pub fn function(&self) -> Option<&str> {
        match self {
            Self::UnknownFunction { name, .. }
            | Self::DuplicateFunction { name, .. }
            | Self::ShapeMismatch { name, .. }
            | Self::MarkerMismatch { name, .. }
            | Self::ImportRejected { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Errors reported by a foreign engine for its own operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("foreign engine has no engine {0}")]
    UnknownEngine(EngineId),

    #[error("engine {0} has no binary installed")]
    NoBinary(EngineId),

    /// The binary could not be compiled.
    #[error("compile error: {0}")]
    Compile(String),

    /// The module does not meet the engine's ABI requirements.
    #[error("validation error: {0}")]
    Validation(String),

    /// Imports could not be bound or the module could not be instantiated.
    #[error("link error: {0}")]
    Link(String),

    #[error("memory range at offset {offset} with length {length} exceeds memory size {size}")]
    MemoryOutOfBounds { offset: u32, length: u32, size: usize },

    #[error("patch length {length} does not match {data_len} data bytes")]
    PatchLengthMismatch { length: u32, data_len: usize },

    #[error("trace serialization failed: {0}")]
    Serialization(String),

    /// A fatal binding error raised by an entry point during execution.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}
