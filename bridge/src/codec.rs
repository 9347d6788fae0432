//! Trace payload decoding.
//!
//! A foreign engine returns either trace data or a short status payload
//! `error:<code>`. Only payloads shorter than [`STATUS_MAX_LEN`] are
//! inspected for the prefix; anything at or above the threshold is data,
//! whatever its contents.

use bytes::Bytes;
use tracebridge_hostapi::{TraceStatus, STATUS_MAX_LEN, STATUS_PREFIX};

use crate::error::BridgeError;

/// Why an execution produced no trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum TraceFailure {
    #[error("out of gas")]
    OutOfGas,
    #[error("execution reverted")]
    ExecutionReverted,
    #[error("stop token")]
    StopToken,
    #[error("unknown")]
    Unknown,
}

impl TraceFailure {
    /// Map a status code. Codes other than 1, 2 and 3 are `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match TraceStatus::from_i64(code) {
            Some(TraceStatus::OutOfGas) => Self::OutOfGas,
            Some(TraceStatus::ExecutionReverted) => Self::ExecutionReverted,
            Some(TraceStatus::StopToken) => Self::StopToken,
            _ => Self::Unknown,
        }
    }
}

/// Decoded outcome of `compute_trace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceResult {
    Success(Bytes),
    Failure(TraceFailure),
}

impl TraceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<TraceFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(*failure),
        }
    }

    pub fn into_result(self) -> Result<Bytes, TraceFailure> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Failure(failure) => Err(failure),
        }
    }

    /// BLAKE3 digest of a success payload.
    pub fn digest(&self) -> Option<[u8; 32]> {
        self.payload().map(|payload| *blake3::hash(payload).as_bytes())
    }
}

/// Decode a raw `compute_trace` payload.
pub fn decode_trace(payload: Vec<u8>) -> Result<TraceResult, BridgeError> {
    if payload.len() < STATUS_MAX_LEN {
        if let Some(code) = payload.strip_prefix(STATUS_PREFIX.as_bytes()) {
            let code = std::str::from_utf8(code)
                .ok()
                .and_then(|code| code.parse::<i64>().ok())
                .ok_or_else(|| BridgeError::MalformedStatus {
                    status: String::from_utf8_lossy(&payload).into_owned(),
                })?;
            return Ok(TraceResult::Failure(TraceFailure::from_code(code)));
        }
    }
    Ok(TraceResult::Success(Bytes::from(payload)))
}
