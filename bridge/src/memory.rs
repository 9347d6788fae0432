//! Memory access for witness replay.

use tracing::debug;
use tracebridge_hostapi::{EngineError, EngineId, ForeignEngine};

use crate::error::BridgeError;

/// Reads and patches one engine's linear memory.
pub struct MemoryAccessor<'a> {
    foreign: &'a dyn ForeignEngine,
    engine: EngineId,
}

impl<'a> MemoryAccessor<'a> {
    pub fn new(foreign: &'a dyn ForeignEngine, engine: EngineId) -> Self {
        Self { foreign, engine }
    }

    /// Copy of the full linear memory at call time.
    pub fn read_snapshot(&self) -> Result<Vec<u8>, BridgeError> {
        Ok(self.foreign.memory_snapshot(self.engine)?)
    }

    /// Copy of `length` bytes at `offset`.
    pub fn read_range(&self, offset: u32, length: u32) -> Result<Vec<u8>, BridgeError> {
        let snapshot = self.read_snapshot()?;
        let start = offset as usize;
        start
            .checked_add(length as usize)
            .and_then(|end| snapshot.get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                BridgeError::Engine(EngineError::MemoryOutOfBounds {
                    offset,
                    length,
                    size: snapshot.len(),
                })
            })
    }

    /// Record and apply a replacement of `length` bytes at `offset`.
    ///
    /// A `length` that disagrees with `data` is rejected here, before the
    /// foreign engine is called.
    pub fn patch_range(&self, offset: u32, length: u32, data: &[u8]) -> Result<(), BridgeError> {
        if data.len() != length as usize {
            return Err(BridgeError::Engine(EngineError::PatchLengthMismatch {
                length,
                data_len: data.len(),
            }));
        }
        self.foreign
            .patch_memory(self.engine, offset, length, data)?;
        debug!(engine = %self.engine, offset, length, "patched memory");
        Ok(())
    }
}
