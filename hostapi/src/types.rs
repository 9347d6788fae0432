//! Boundary types shared by the bridge and every foreign engine.
//!
//! `EngineId` correlates every call and callback to one engine instance,
//! `CallShape` describes an import's parameter width and arity, and the
//! entry-point types are the global functions a foreign engine calls back
//! into. The trace status convention (`error:<code>`) also lives here so both
//! sides agree on it.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::FatalError;

/// Source of engine identifiers for the whole process.
static NEXT_ENGINE_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque 32-bit engine identifier assigned by the foreign engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(pub u32);

impl EngineId {
    /// Allocate a fresh identifier.
    ///
    /// All `ForeignEngine` implementations draw from the same counter, so two
    /// engine instances in one process never hand out the same id.
    pub fn allocate() -> Self {
        Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Leading marker slot of an i32 argument buffer.
    pub fn marker_i32(self) -> i32 {
        self.0 as i32
    }

    /// Leading marker slot of an i64 argument buffer.
    pub fn marker_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Call shape of a host import, as seen by the WASM module.
///
/// Counts exclude the engine-identity marker that the foreign engine
/// prepends to every raw argument buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// `arity` i32 parameters (1..=3), no result.
    Notify { arity: usize },
    /// `params` i32 parameters, one i32 result.
    I32 { params: usize },
    /// `params` i64 parameters, one i32 result.
    I64 { params: usize },
}

impl CallShape {
    /// Largest supported fixed arity for notification imports.
    pub const MAX_NOTIFY_ARITY: usize = 3;

    /// Fixed-arity notification shape, `None` outside `1..=3`.
    pub fn notify(arity: usize) -> Option<Self> {
        (1..=Self::MAX_NOTIFY_ARITY)
            .contains(&arity)
            .then_some(Self::Notify { arity })
    }

    /// Number of parameters the WASM module passes.
    pub fn param_count(self) -> usize {
        match self {
            Self::Notify { arity } => arity,
            Self::I32 { params } | Self::I64 { params } => params,
        }
    }

    /// Whether parameters are 64 bits wide.
    pub fn is_wide(self) -> bool {
        matches!(self, Self::I64 { .. })
    }

    /// Whether the import produces an i32 result.
    pub fn returns_value(self) -> bool {
        !matches!(self, Self::Notify { .. })
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify { arity } => write!(f, "notify({} x i32)", arity),
            Self::I32 { params } => write!(f, "({} x i32) -> i32", params),
            Self::I64 { params } => write!(f, "({} x i64) -> i32", params),
        }
    }
}

/// Global entry point for fixed-arity notification imports.
pub type NotifyEntry = fn(EngineId, &str, &[i32]) -> Result<(), FatalError>;

/// Global entry point for i32-parameter imports.
pub type I32Entry = fn(EngineId, &str, &[i32]) -> Result<i32, FatalError>;

/// Global entry point for i64-parameter imports.
pub type I64Entry = fn(EngineId, &str, &[i64]) -> Result<i32, FatalError>;

/// Global entry point for execution-log notifications (JSON fragment bytes).
pub type LogEntry = fn(EngineId, &[u8]) -> Result<(), FatalError>;

/// An entry point handed to the foreign engine when an import is bound.
#[derive(Clone, Copy)]
pub enum EntryPoint {
    Notify(NotifyEntry),
    I32(I32Entry),
    I64(I64Entry),
}

impl EntryPoint {
    /// Whether this entry point can serve imports of `shape`.
    ///
    /// Notification imports are limited to the fixed arities in
    /// [`CallShape::notify`].
    pub fn accepts(&self, shape: CallShape) -> bool {
        match (self, shape) {
            (Self::Notify(_), CallShape::Notify { arity }) => CallShape::notify(arity).is_some(),
            (Self::I32(_), CallShape::I32 { .. }) | (Self::I64(_), CallShape::I64 { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify(_) => f.write_str("EntryPoint::Notify"),
            Self::I32(_) => f.write_str("EntryPoint::I32"),
            Self::I64(_) => f.write_str("EntryPoint::I64"),
        }
    }
}

/// Prefix marking a trace payload as an encoded status instead of data.
pub const STATUS_PREFIX: &str = "error:";

/// Payloads at least this long are always trace data.
pub const STATUS_MAX_LEN: usize = 15;

/// Status codes a foreign engine reports in place of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TraceStatus {
    Ok = 0,
    OutOfGas = 1,
    ExecutionReverted = 2,
    StopToken = 3,
    Unknown = 4,
}

impl TraceStatus {
    /// Convert from the integer carried after the status prefix.
    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::OutOfGas),
            2 => Some(Self::ExecutionReverted),
            3 => Some(Self::StopToken),
            4 => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Encode as a status payload, e.g. `error:1`.
    pub fn encode(self) -> Vec<u8> {
        format!("{}{}", STATUS_PREFIX, self.as_i32()).into_bytes()
    }
}
