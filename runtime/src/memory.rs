//! Linear memory helpers with bounds checking.
//!
//! Ranges are validated against the memory size before access and
//! out-of-bounds ranges are reported, never clamped.

use std::ops::Range;

use tracebridge_hostapi::EngineError;

/// Validate that `[offset, offset+length)` is within a memory of `size` bytes.
pub fn validate_range(size: usize, offset: u32, length: u32) -> Result<Range<usize>, EngineError> {
    let out_of_bounds = || EngineError::MemoryOutOfBounds {
        offset,
        length,
        size,
    };
    let start = offset as usize;
    let end = start.checked_add(length as usize).ok_or_else(out_of_bounds)?;
    if end > size {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

/// Write `data` to memory at `offset`.
pub fn write_bytes(mem: &mut [u8], offset: u32, data: &[u8]) -> Result<(), EngineError> {
    let length = u32::try_from(data.len()).map_err(|_| EngineError::MemoryOutOfBounds {
        offset,
        length: u32::MAX,
        size: mem.len(),
    })?;
    let range = validate_range(mem.len(), offset, length)?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Byte ranges of `mem` that contain anything other than zeroes.
///
/// Adjacent non-zero bytes are merged into a single run.
pub fn non_zero_runs(mem: &[u8]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, byte) in mem.iter().enumerate() {
        match (start, *byte != 0) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                runs.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..mem.len());
    }
    runs
}

/// A recorded replacement of a memory range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPatch {
    pub offset: u32,
    pub data: Vec<u8>,
}

impl MemoryPatch {
    /// Build a patch, checking that `length` matches the data supplied.
    pub fn new(offset: u32, length: u32, data: &[u8]) -> Result<Self, EngineError> {
        if length as usize != data.len() {
            return Err(EngineError::PatchLengthMismatch {
                length,
                data_len: data.len(),
            });
        }
        Ok(Self {
            offset,
            data: data.to_vec(),
        })
    }

    pub(crate) fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn apply(&self, mem: &mut [u8]) -> Result<(), EngineError> {
        write_bytes(mem, self.offset, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_bytes() {
        let mut mem = vec![0u8; 10];
        write_bytes(&mut mem, 2, &[1, 2, 3]).unwrap();
        assert_eq!(&mem[..6], &[0, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_write_bytes_out_of_bounds_leaves_memory_untouched() {
        let mut mem = vec![0u8; 4];
        let err = write_bytes(&mut mem, 3, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MemoryOutOfBounds { offset: 3, length: 2, size: 4 }
        ));
        assert_eq!(mem, vec![0u8; 4]);
    }

    #[test]
    fn test_non_zero_runs() {
        let mem = [0, 1, 2, 0, 0, 3, 0, 4];
        assert_eq!(non_zero_runs(&mem), vec![1..3, 5..6, 7..8]);
        assert!(non_zero_runs(&[0u8; 16]).is_empty());
        assert_eq!(non_zero_runs(&[9, 9]), vec![0..2]);
    }

    #[test]
    fn test_patch_length_must_match_data() {
        let err = MemoryPatch::new(0, 4, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PatchLengthMismatch { length: 4, data_len: 2 }
        ));
    }

    #[test]
    fn test_patch_apply() {
        let mut mem = vec![0u8; 8];
        let patch = MemoryPatch::new(4, 2, &[7, 8]).unwrap();
        patch.apply(&mut mem).unwrap();
        assert_eq!(mem, vec![0, 0, 0, 0, 7, 8, 0, 0]);
        assert_eq!(patch.len(), 2);

        let mut short = vec![0u8; 5];
        assert!(patch.apply(&mut short).is_err());
        assert_eq!(short, vec![0u8; 5]);
    }
}
