//! `aero-buffer-cache` feeds guest-resident draw data into a GPU-visible ring buffer.
//!
//! Every draw needs some combination of:
//! - the shader constant registers (always re-uploaded, see
//!   [`BufferCache::upload_constant_registers`]),
//! - an index buffer (always re-uploaded, with primitive-restart remapping, see
//!   [`BufferCache::upload_index_buffer`]),
//! - vertex buffers (cached by guest address range, see [`BufferCache::upload_vertex_buffer`]).
//!
//! The crate owns the policy on top of a [`RingAllocator`]: a fast allocation attempt, a single
//! scavenge-and-retry, then [`UploadError::OutOfSpace`]. Guest data is big-endian, so every upload
//! runs through a [`ByteSwapper`]; on x86_64 and aarch64 the default swapper is vectorized.
//!
//! The GPU objects themselves (buffer creation, descriptor sets) live outside this crate. The
//! seams are [`RingAllocator`], [`GuestMemory`], [`RegisterFile`] and [`CommandRecorder`].

mod buffer_cache;
mod error;
mod interval_cache;
mod stats;

pub mod barrier;
pub mod codec;
pub mod guest_memory;
pub mod registers;
pub mod ring;

pub use barrier::{
    AccessFlags, BufferBarrier, CommandLog, CommandRecorder, PipelineStages, RecordedCommand,
};
pub use buffer_cache::{
    BufferBinding, BufferCache, BufferCacheConfig, ConstantOffsets, FRAGMENT_CONSTANTS_BINDING,
    VERTEX_CONSTANTS_BINDING,
};
pub use codec::{ByteSwapper, Endian, NativeSwapper, ScalarSwapper};
pub use error::UploadError;
pub use guest_memory::{GuestMemory, GuestMemoryError, VecGuestMemory};
pub use interval_cache::{CacheEntry, IntervalCache};
pub use registers::{
    ConstantRegisterBlob, IndexFormat, RegisterFile, RegisterFileError, RegisterSnapshot,
    CONSTANT_REGISTER_UNIFORM_RANGE,
};
pub use ring::{
    BufferHandle, CircularBuffer, CircularBufferDescriptor, CircularBufferError,
    CompletionToken, Fence, RingAllocator, TransientAllocation,
};
pub use stats::BufferCacheStats;

#[cfg(any(
    target_arch = "x86_64",
    all(target_arch = "aarch64", target_endian = "little")
))]
pub use codec::SimdSwapper;
