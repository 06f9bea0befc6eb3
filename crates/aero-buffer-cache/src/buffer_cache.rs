use tracing::{debug, trace, warn};

use crate::barrier::{AccessFlags, BufferBarrier, CommandRecorder, PipelineStages};
use crate::codec::{ByteSwapper, Endian, NativeSwapper};
use crate::error::UploadError;
use crate::guest_memory::GuestMemory;
use crate::interval_cache::IntervalCache;
use crate::registers::{
    ConstantRegisterBlob, IndexFormat, RegisterFile, CONSTANT_REGISTER_UNIFORM_RANGE,
};
use crate::ring::{BufferHandle, RingAllocator, TransientAllocation};
use crate::stats::BufferCacheStats;

/// Dynamic uniform binding that receives the vertex stage's view of the constant blob.
pub const VERTEX_CONSTANTS_BINDING: u32 = 0;
/// Dynamic uniform binding that receives the fragment stage's view of the constant blob.
pub const FRAGMENT_CONSTANTS_BINDING: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct BufferCacheConfig {
    /// Widen vertex uploads to the whole guest allocation containing the requested range, so
    /// later requests for other parts of it hit the cache.
    ///
    /// Off by default: some titles alias a single allocation with data that is rewritten between
    /// draws, and the wider upload then serves stale vertices until the next invalidation.
    pub expand_vertex_uploads: bool,
}

/// Where an upload landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    pub buffer: BufferHandle,
    pub offset: u64,
}

/// Dynamic offsets for the two constant bindings. Both stages read the same blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantOffsets {
    pub vertex: u64,
    pub fragment: u64,
}

/// Transient upload cache for a single command-recording thread.
///
/// Owns the ring allocator together with the guest-address cache of vertex uploads, so that
/// reclaiming ring space and forgetting the offsets that pointed into it always happen together.
pub struct BufferCache<R, S = NativeSwapper> {
    ring: R,
    cache: IntervalCache,
    swapper: S,
    config: BufferCacheConfig,
    stats: BufferCacheStats,
}

impl<R> BufferCache<R>
where
    R: RingAllocator,
{
    pub fn new(ring: R, config: BufferCacheConfig) -> Self {
        Self::with_swapper(ring, config, NativeSwapper::default())
    }
}

impl<R, S> BufferCache<R, S>
where
    R: RingAllocator,
    S: ByteSwapper,
{
    pub fn with_swapper(ring: R, config: BufferCacheConfig, swapper: S) -> Self {
        Self {
            ring,
            cache: IntervalCache::new(),
            swapper,
            config,
            stats: BufferCacheStats::default(),
        }
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    pub fn interval_cache(&self) -> &IntervalCache {
        &self.cache
    }

    pub fn config(&self) -> &BufferCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> BufferCacheStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BufferCacheStats::default();
    }

    /// Reserve `length` bytes of ring space for the submission guarded by `token`.
    ///
    /// Tries the ring once; if it is full, scavenges (dropping every cached vertex range) and tries
    /// exactly once more.
    pub fn allocate_transient(
        &mut self,
        length: u64,
        token: R::Token,
    ) -> Result<TransientAllocation, UploadError> {
        if let Some(allocation) = self.ring.acquire(length, token.clone()) {
            return Ok(allocation);
        }

        debug!(length, "transient ring full, scavenging before retry");
        self.scavenge();

        match self.ring.acquire(length, token) {
            Some(allocation) => Ok(allocation),
            None => {
                self.stats.allocation_failures += 1;
                let capacity = self.ring.capacity();
                warn!(length, capacity, "transient ring exhausted after scavenge");
                Err(UploadError::OutOfSpace {
                    requested: length,
                    capacity,
                })
            }
        }
    }

    /// Upload every shader constant as one [`ConstantRegisterBlob`].
    ///
    /// Constants change on nearly every draw, so nothing is cached.
    pub fn upload_constant_registers(
        &mut self,
        recorder: &mut impl CommandRecorder,
        registers: &impl RegisterFile,
        token: R::Token,
    ) -> Result<ConstantOffsets, UploadError> {
        let blob = ConstantRegisterBlob::capture(registers)?;

        let allocation = self.allocate_transient(CONSTANT_REGISTER_UNIFORM_RANGE, token)?;
        let dst = mapped_mut(&mut self.ring, &allocation)?;
        dst.copy_from_slice(blob.as_bytes());

        self.finish_upload(
            recorder,
            &allocation,
            AccessFlags::UNIFORM_READ | AccessFlags::SHADER_READ,
            PipelineStages::ALL_COMMANDS,
        );

        Ok(ConstantOffsets {
            vertex: allocation.offset,
            fragment: allocation.offset,
        })
    }

    /// Upload `source_length` bytes of indices from guest memory.
    ///
    /// When primitive restart is enabled in `registers`, the guest's restart index is rewritten to
    /// the all-ones value of the index width.
    #[allow(clippy::too_many_arguments)]
    pub fn upload_index_buffer(
        &mut self,
        recorder: &mut impl CommandRecorder,
        memory: &impl GuestMemory,
        registers: &impl RegisterFile,
        source_addr: u32,
        source_length: u32,
        format: IndexFormat,
        token: R::Token,
    ) -> Result<BufferBinding, UploadError> {
        let src = memory.translate_physical(source_addr, source_length)?;

        let allocation = self.allocate_transient(u64::from(source_length), token)?;
        let dst = mapped_mut(&mut self.ring, &allocation)?;

        let count = (source_length / format.element_size()) as usize;
        let restart = registers
            .primitive_restart_enabled()
            .then(|| registers.primitive_restart_index());
        match (format, restart) {
            (IndexFormat::Int16, Some(index)) => {
                self.swapper.swap16_cmp(dst, src, index as u16, count)
            }
            (IndexFormat::Int16, None) => self.swapper.swap16(dst, src, count),
            (IndexFormat::Int32, Some(index)) => self.swapper.swap32_cmp(dst, src, index, count),
            (IndexFormat::Int32, None) => self.swapper.swap32(dst, src, count),
        }
        let done = count * format.element_size() as usize;
        dst[done..].copy_from_slice(&src[done..]);

        self.finish_upload(
            recorder,
            &allocation,
            AccessFlags::INDEX_READ,
            PipelineStages::VERTEX_INPUT,
        );

        Ok(BufferBinding {
            buffer: self.ring.buffer(),
            offset: allocation.offset,
        })
    }

    /// Upload (or reuse) a guest vertex buffer range.
    ///
    /// Only [`Endian::Swap8In32`] and [`Endian::Swap16In32`] are valid for vertex data.
    pub fn upload_vertex_buffer(
        &mut self,
        recorder: &mut impl CommandRecorder,
        memory: &impl GuestMemory,
        source_addr: u32,
        source_length: u32,
        endian: Endian,
        token: R::Token,
    ) -> Result<BufferBinding, UploadError> {
        if !matches!(endian, Endian::Swap8In32 | Endian::Swap16In32) {
            return Err(UploadError::UnsupportedEndian(endian));
        }

        if let Some(offset) = self.cache.find(source_addr, source_length) {
            self.stats.vertex_cache_hits += 1;
            trace!(source_addr, source_length, offset, "vertex cache hit");
            return Ok(BufferBinding {
                buffer: self.ring.buffer(),
                offset,
            });
        }
        self.stats.vertex_cache_misses += 1;

        // Widening is opportunistic: it never scavenges and never turns an upload that fits into
        // a failure.
        if let Some((base, size)) = self.expanded_vertex_range(memory, source_addr, source_length)
        {
            if let Ok(src) = memory.translate_physical(base, size) {
                if let Some(allocation) = self.ring.acquire(u64::from(size), token.clone()) {
                    return self.commit_vertex_upload(
                        recorder,
                        src,
                        base,
                        &allocation,
                        endian,
                        source_addr,
                    );
                }
            }
            debug!(
                source_addr,
                source_length,
                base,
                size,
                "expanded vertex upload unavailable, uploading requested range"
            );
        }

        let src = memory.translate_physical(source_addr, source_length)?;
        let allocation = self.allocate_transient(u64::from(source_length), token)?;
        self.commit_vertex_upload(recorder, src, source_addr, &allocation, endian, source_addr)
    }

    /// Flush the whole mapped ring. Call once per command batch, before submission.
    pub fn flush(&mut self, recorder: &mut impl CommandRecorder) {
        recorder.flush_mapped_range(self.ring.buffer(), 0, self.ring.capacity());
    }

    /// Guest memory may have changed; forget every cached vertex range.
    pub fn invalidate_cache(&mut self) {
        debug!(entries = self.cache.len(), "invalidating transient vertex cache");
        self.cache.clear();
    }

    /// Forget every cached vertex range without touching the ring.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Reclaim ring space whose tokens have signaled.
    ///
    /// Reclaimed bytes may back any cached range, so the vertex cache is dropped first.
    pub fn scavenge(&mut self) {
        self.cache.clear();
        self.ring.scavenge();
        self.stats.scavenges += 1;
    }

    /// The guest allocation containing the request, when widening is enabled and worthwhile.
    fn expanded_vertex_range(
        &self,
        memory: &impl GuestMemory,
        source_addr: u32,
        source_length: u32,
    ) -> Option<(u32, u32)> {
        if !self.config.expand_vertex_uploads {
            return None;
        }
        let (base, size) = memory.query_base_and_size(source_addr)?;
        let requested_end = u64::from(source_addr) + u64::from(source_length);
        let contains = base <= source_addr && u64::from(base) + u64::from(size) >= requested_end;
        let widens = base != source_addr || size != source_length;
        if !contains || !widens || u64::from(size) > self.ring.capacity() {
            return None;
        }
        debug!(source_addr, source_length, base, size, "expanding vertex upload");
        Some((base, size))
    }

    /// Swap `src` (guest bytes starting at `base`) into `allocation` and cache the range.
    fn commit_vertex_upload(
        &mut self,
        recorder: &mut impl CommandRecorder,
        src: &[u8],
        base: u32,
        allocation: &TransientAllocation,
        endian: Endian,
        source_addr: u32,
    ) -> Result<BufferBinding, UploadError> {
        let dst = mapped_mut(&mut self.ring, allocation)?;
        self.swapper.copy_swapped(endian, dst, src, src.len());

        self.finish_upload(
            recorder,
            allocation,
            AccessFlags::VERTEX_ATTRIBUTE_READ,
            PipelineStages::VERTEX_INPUT,
        );

        self.cache.insert(base, allocation.length as u32, allocation.offset);

        Ok(BufferBinding {
            buffer: self.ring.buffer(),
            offset: allocation.offset + u64::from(source_addr - base),
        })
    }

    fn finish_upload(
        &mut self,
        recorder: &mut impl CommandRecorder,
        allocation: &TransientAllocation,
        dst_access: AccessFlags,
        dst_stages: PipelineStages,
    ) {
        self.ring.flush(allocation.offset, allocation.length);
        recorder.pipeline_barrier(
            PipelineStages::HOST,
            dst_stages,
            BufferBarrier {
                src_access: AccessFlags::HOST_WRITE,
                dst_access,
                buffer: self.ring.buffer(),
                offset: allocation.offset,
                size: allocation.length,
            },
        );
        self.stats.bytes_uploaded += allocation.length;
    }
}

fn mapped_mut<'a, R: RingAllocator>(
    ring: &'a mut R,
    allocation: &TransientAllocation,
) -> Result<&'a mut [u8], UploadError> {
    let capacity = ring.capacity();
    ring.mapped_mut(allocation)
        .ok_or(UploadError::MappingOutOfBounds {
            offset: allocation.offset,
            length: allocation.length,
            capacity,
        })
}
