//! Fence-gated ring allocation.
//!
//! [`RingAllocator`] is the seam between the upload cache and whatever owns the GPU buffer. The
//! cache only ever holds offsets; the allocator is the sole authority for carving regions out of
//! the mapped memory and hands out bounds-checked views through [`RingAllocator::mapped_mut`].
//!
//! [`CircularBuffer`] is a CPU-side implementation over an owned byte region. Backends that map a
//! real device buffer can wrap the same bookkeeping around their mapping.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be > 0.
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);

    let add = alignment - 1;
    match value.checked_add(add) {
        Some(v) => v / alignment * alignment,
        None => u64::MAX / alignment * alignment,
    }
}

/// Opaque identifier of the device buffer backing a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferHandle(pub u64);

/// A byte range handed out by a [`RingAllocator`].
///
/// The record carries no ownership: the allocator keeps the live bookkeeping (and the completion
/// token) until a scavenge pass retires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientAllocation {
    pub offset: u64,
    pub length: u64,
}

impl TransientAllocation {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Marker telling the ring when the GPU has finished consuming an allocation.
pub trait CompletionToken {
    fn is_signaled(&self) -> bool;
}

/// A host-side fence that can be cloned into every allocation of a submission.
///
/// The submission path signals it once the GPU work that read the allocations has retired.
#[derive(Clone, Default)]
pub struct Fence {
    signaled: Arc<AtomicBool>,
}

impl Fence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

impl CompletionToken for Fence {
    fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

/// Fixed-capacity, host-and-device-visible ring buffer.
pub trait RingAllocator {
    type Token: Clone;

    /// Reserve `length` bytes tagged with `token`. Returns `None` when no contiguous span is free.
    fn acquire(&mut self, length: u64, token: Self::Token) -> Option<TransientAllocation>;

    /// Retire allocations whose token has signaled. Must not block.
    fn scavenge(&mut self);

    /// Make host writes to `[offset, offset + length)` visible to the device.
    fn flush(&mut self, offset: u64, length: u64);

    /// Host view of a live allocation, or `None` if it does not lie inside the mapping.
    fn mapped_mut(&mut self, allocation: &TransientAllocation) -> Option<&mut [u8]>;

    fn buffer(&self) -> BufferHandle;

    fn capacity(&self) -> u64;
}

#[derive(Debug, Error)]
pub enum CircularBufferError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(&'static str),
}

#[derive(Debug, Clone)]
pub struct CircularBufferDescriptor {
    pub buffer: BufferHandle,
    /// Total size of the mapped region in bytes.
    pub capacity: u64,
    /// Every allocation starts on, and is padded to, this many bytes.
    pub alignment: u64,
}

impl Default for CircularBufferDescriptor {
    fn default() -> Self {
        Self {
            buffer: BufferHandle::default(),
            capacity: 32 * 1024 * 1024,
            alignment: 4096,
        }
    }
}

#[derive(Debug)]
struct LiveAllocation<T> {
    offset: u64,
    aligned_length: u64,
    token: T,
}

/// CPU-side [`RingAllocator`] over an owned byte region.
///
/// Allocations are handed out in FIFO order starting at the write head, wrapping to offset 0 when
/// the tail of the region is too small. Space is only returned by [`RingAllocator::scavenge`],
/// which retires the oldest allocations whose token has signaled.
pub struct CircularBuffer<T> {
    buffer: BufferHandle,
    host: Vec<u8>,
    alignment: u64,
    read_head: u64,
    write_head: u64,
    live: VecDeque<LiveAllocation<T>>,
    bytes_flushed: u64,
}

impl<T> CircularBuffer<T>
where
    T: CompletionToken + Clone,
{
    pub fn new(desc: CircularBufferDescriptor) -> Result<Self, CircularBufferError> {
        if desc.capacity == 0 {
            return Err(CircularBufferError::InvalidDescriptor("capacity must be > 0"));
        }
        if !desc.alignment.is_power_of_two() {
            return Err(CircularBufferError::InvalidDescriptor(
                "alignment must be a power of two",
            ));
        }
        if desc.capacity % desc.alignment != 0 {
            return Err(CircularBufferError::InvalidDescriptor(
                "capacity must be a multiple of alignment",
            ));
        }
        let len = usize::try_from(desc.capacity).map_err(|_| {
            CircularBufferError::InvalidDescriptor("capacity does not fit in host memory")
        })?;

        Ok(Self {
            buffer: desc.buffer,
            host: vec![0u8; len],
            alignment: desc.alignment,
            read_head: 0,
            write_head: 0,
            live: VecDeque::new(),
            bytes_flushed: 0,
        })
    }

    /// Whole mapped region, for inspection.
    pub fn host(&self) -> &[u8] {
        &self.host
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Number of allocations not yet retired by a scavenge pass.
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Bytes currently reserved by live allocations (including alignment padding).
    pub fn used(&self) -> u64 {
        self.live.iter().map(|a| a.aligned_length).sum()
    }

    pub fn bytes_flushed(&self) -> u64 {
        self.bytes_flushed
    }

    fn is_live(&self, offset: u64, length: u64) -> bool {
        let end = offset.saturating_add(length);
        let covers =
            |a: &LiveAllocation<T>| a.offset <= offset && end <= a.offset + a.aligned_length;
        // Uploads map the allocation they just acquired, which is always the newest.
        match self.live.back() {
            Some(newest) if covers(newest) => true,
            _ => self.live.iter().rev().skip(1).any(covers),
        }
    }
}

impl<T> RingAllocator for CircularBuffer<T>
where
    T: CompletionToken + Clone,
{
    type Token = T;

    fn acquire(&mut self, length: u64, token: T) -> Option<TransientAllocation> {
        let capacity = self.capacity();
        let aligned_length = align_up(length.max(1), self.alignment);
        if aligned_length > capacity {
            return None;
        }

        if self.live.is_empty() {
            self.read_head = 0;
            self.write_head = 0;
        } else if self.read_head == self.write_head {
            // Non-empty with both heads together: every byte is reserved.
            return None;
        }

        let offset = if self.write_head >= self.read_head {
            if self.write_head + aligned_length <= capacity {
                self.write_head
            } else if aligned_length <= self.read_head {
                // Tail is too short; wrap and take the front of the region instead.
                0
            } else {
                return None;
            }
        } else if self.write_head + aligned_length <= self.read_head {
            self.write_head
        } else {
            return None;
        };

        self.write_head = offset + aligned_length;
        self.live.push_back(LiveAllocation {
            offset,
            aligned_length,
            token,
        });
        trace!(offset, length, aligned_length, "ring acquire");

        Some(TransientAllocation { offset, length })
    }

    fn scavenge(&mut self) {
        while let Some(front) = self.live.front() {
            if !front.token.is_signaled() {
                break;
            }
            self.live.pop_front();
        }

        match self.live.front() {
            Some(front) => self.read_head = front.offset,
            None => {
                self.read_head = 0;
                self.write_head = 0;
            }
        }
    }

    fn flush(&mut self, offset: u64, length: u64) {
        debug_assert!(
            offset.saturating_add(length) <= self.capacity(),
            "flush range [{offset}, +{length}) exceeds ring capacity"
        );
        self.bytes_flushed += length;
    }

    fn mapped_mut(&mut self, allocation: &TransientAllocation) -> Option<&mut [u8]> {
        if !self.is_live(allocation.offset, allocation.length) {
            return None;
        }
        let start = usize::try_from(allocation.offset).ok()?;
        let end = start.checked_add(usize::try_from(allocation.length).ok()?)?;
        self.host.get_mut(start..end)
    }

    fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    fn capacity(&self) -> u64 {
        self.host.len() as u64
    }
}

impl<T> fmt::Debug for CircularBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("buffer", &self.buffer)
            .field("capacity", &self.host.len())
            .field("alignment", &self.alignment)
            .field("read_head", &self.read_head)
            .field("write_head", &self.write_head)
            .field("live", &self.live.len())
            .finish()
    }
}
