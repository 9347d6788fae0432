//! Bridge error types.

use tracebridge_hostapi::{EngineError, EngineId, FatalError};

/// Top-level error type for the bridge crate.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A binding-contract violation. Already reported to the fatal handler.
    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),

    /// The foreign engine failed one of its own operations.
    #[error("foreign engine error: {0}")]
    Engine(EngineError),

    #[error("engine {0} is not registered")]
    EngineNotFound(EngineId),

    /// A status payload whose code is not a decimal integer.
    #[error("malformed trace status {status:?}")]
    MalformedStatus { status: String },
}

impl BridgeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn as_fatal(&self) -> Option<&FatalError> {
        match self {
            Self::Fatal(fatal) => Some(fatal),
            _ => None,
        }
    }
}

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Fatal(fatal) => Self::Fatal(fatal),
            other => Self::Engine(other),
        }
    }
}
