//! Execution halts and trap classification.

use tracing::debug;
use tracebridge_hostapi::{EngineError, FatalError, TraceStatus};
use wasmtime::Trap;

/// Reason a guest stopped through one of the built-in halting imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Halt {
    #[error("guest requested stop")]
    Stop,
    #[error("guest reverted execution")]
    Revert,
}

impl Halt {
    pub fn status(self) -> TraceStatus {
        match self {
            Self::Stop => TraceStatus::StopToken,
            Self::Revert => TraceStatus::ExecutionReverted,
        }
    }
}

/// Whether an instantiation or call error came from guest execution
/// rather than from linking.
pub(crate) fn is_execution_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Trap>().is_some()
        || err.downcast_ref::<Halt>().is_some()
        || err.downcast_ref::<FatalError>().is_some()
}

/// Map a failed guest call to the status reported in place of a trace.
///
/// Fatal binding errors raised by an entry point are not statuses; they
/// abort the trace and propagate.
pub(crate) fn classify_trap(err: anyhow::Error) -> Result<TraceStatus, EngineError> {
    if let Some(fatal) = err.downcast_ref::<FatalError>() {
        return Err(EngineError::Fatal(fatal.clone()));
    }
    if let Some(halt) = err.downcast_ref::<Halt>() {
        return Ok(halt.status());
    }
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => Ok(TraceStatus::OutOfGas),
        _ => {
            debug!(error = %err, "guest trapped");
            Ok(TraceStatus::Unknown)
        }
    }
}
