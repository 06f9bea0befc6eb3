use thiserror::Error;

use crate::codec::Endian;
use crate::guest_memory::GuestMemoryError;
use crate::registers::RegisterFileError;

/// Failure of a single upload request.
///
/// None of these are retried by the cache. [`UploadError::OutOfSpace`] is the only variant a
/// well-behaved caller is expected to see in practice; it means the draw should be skipped or
/// deferred to the next frame.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("transient ring out of space: requested {requested} bytes (capacity {capacity} bytes)")]
    OutOfSpace { requested: u64, capacity: u64 },
    #[error("endian mode {0:?} is not supported for vertex data")]
    UnsupportedEndian(Endian),
    #[error("unknown endian mode {0}")]
    UnsupportedEndianValue(u32),
    #[error("unknown index format {0}")]
    UnsupportedIndexFormat(u32),
    #[error("ring allocation at offset {offset} (length {length}) is outside the mapped region ({capacity} bytes)")]
    MappingOutOfBounds {
        offset: u64,
        length: u64,
        capacity: u64,
    },
    #[error(transparent)]
    GuestMemory(#[from] GuestMemoryError),
    #[error(transparent)]
    Registers(#[from] RegisterFileError),
}

impl UploadError {
    /// Whether this error is the recoverable "no space this frame" condition.
    pub fn is_out_of_space(&self) -> bool {
        matches!(self, UploadError::OutOfSpace { .. })
    }
}
