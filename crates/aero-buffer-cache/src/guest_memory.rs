//! Guest physical memory as seen by the upload pipelines.
//!
//! The emulator's memory system provides the real implementation. Uploads only ever read, and the
//! returned slice borrows the guest backing directly so the codec can transform straight into the
//! ring without an intermediate copy.

use core::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuestMemoryError {
    OutOfBounds { address: u32, len: u32 },
}

impl fmt::Display for GuestMemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestMemoryError::OutOfBounds { address, len } => write!(
                f,
                "guest memory access out of bounds: address=0x{address:x}, len=0x{len:x}"
            ),
        }
    }
}

impl std::error::Error for GuestMemoryError {}

pub trait GuestMemory {
    /// Host-readable view of `[address, address + length)`.
    fn translate_physical(&self, address: u32, length: u32) -> Result<&[u8], GuestMemoryError>;

    /// Base and size of the guest allocation containing `address`, if the memory system tracks
    /// allocations.
    fn query_base_and_size(&self, _address: u32) -> Option<(u32, u32)> {
        None
    }
}

/// Simple contiguous guest RAM starting at address 0, for tests and tooling.
///
/// Regions registered with [`VecGuestMemory::add_region`] play the role of guest heap allocations
/// and answer [`GuestMemory::query_base_and_size`].
#[derive(Clone, Debug)]
pub struct VecGuestMemory {
    data: Vec<u8>,
    regions: Vec<(u32, u32)>,
}

impl VecGuestMemory {
    pub fn new(size_bytes: usize) -> Self {
        Self {
            data: vec![0u8; size_bytes],
            regions: Vec::new(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn write(&mut self, address: u32, src: &[u8]) -> Result<(), GuestMemoryError> {
        let len = u32::try_from(src.len()).map_err(|_| GuestMemoryError::OutOfBounds {
            address,
            len: u32::MAX,
        })?;
        let start = address as usize;
        let end = start
            .checked_add(src.len())
            .ok_or(GuestMemoryError::OutOfBounds { address, len })?;
        let dst = self
            .data
            .get_mut(start..end)
            .ok_or(GuestMemoryError::OutOfBounds { address, len })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Register `[base, base + size)` as one guest allocation.
    pub fn add_region(&mut self, base: u32, size: u32) {
        self.regions.push((base, size));
    }
}

impl GuestMemory for VecGuestMemory {
    fn translate_physical(&self, address: u32, length: u32) -> Result<&[u8], GuestMemoryError> {
        let start = address as usize;
        let end = start
            .checked_add(length as usize)
            .ok_or(GuestMemoryError::OutOfBounds {
                address,
                len: length,
            })?;
        self.data.get(start..end).ok_or(GuestMemoryError::OutOfBounds {
            address,
            len: length,
        })
    }

    fn query_base_and_size(&self, address: u32) -> Option<(u32, u32)> {
        self.regions.iter().copied().find(|&(base, size)| {
            address >= base && u64::from(address) < u64::from(base) + u64::from(size)
        })
    }
}
