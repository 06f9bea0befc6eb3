//! Shared helpers for `aero-buffer-cache` integration tests.

use std::cell::Cell;
use std::rc::Rc;

use aero_buffer_cache::{
    BufferCache, BufferCacheConfig, BufferHandle, CircularBuffer, CircularBufferDescriptor, Fence,
    RingAllocator, TransientAllocation,
};

pub const RING_BUFFER: BufferHandle = BufferHandle(0x55);

/// Knobs and call counters shared between a test and its [`ScriptedRing`].
#[derive(Debug, Default)]
pub struct RingScript {
    /// Number of upcoming `acquire` calls to refuse before delegating to the real ring.
    pub refuse_next: Cell<usize>,
    pub acquires: Cell<usize>,
    pub scavenges: Cell<usize>,
}

/// [`RingAllocator`] wrapper around a [`CircularBuffer`] that can refuse acquires on demand.
pub struct ScriptedRing {
    inner: CircularBuffer<Fence>,
    script: Rc<RingScript>,
}

impl ScriptedRing {
    pub fn new(capacity: u64, alignment: u64) -> (Self, Rc<RingScript>) {
        let inner = CircularBuffer::new(CircularBufferDescriptor {
            buffer: RING_BUFFER,
            capacity,
            alignment,
        })
        .expect("valid ring descriptor");
        let script = Rc::new(RingScript::default());
        (
            Self {
                inner,
                script: script.clone(),
            },
            script,
        )
    }

    pub fn inner(&self) -> &CircularBuffer<Fence> {
        &self.inner
    }

    pub fn bytes(&self, offset: u64, len: usize) -> &[u8] {
        &self.inner.host()[offset as usize..][..len]
    }
}

impl RingAllocator for ScriptedRing {
    type Token = Fence;

    fn acquire(&mut self, length: u64, token: Fence) -> Option<TransientAllocation> {
        self.script.acquires.set(self.script.acquires.get() + 1);
        let refuse = self.script.refuse_next.get();
        if refuse > 0 {
            self.script.refuse_next.set(refuse - 1);
            return None;
        }
        self.inner.acquire(length, token)
    }

    fn scavenge(&mut self) {
        self.script.scavenges.set(self.script.scavenges.get() + 1);
        self.inner.scavenge();
    }

    fn flush(&mut self, offset: u64, length: u64) {
        self.inner.flush(offset, length);
    }

    fn mapped_mut(&mut self, allocation: &TransientAllocation) -> Option<&mut [u8]> {
        self.inner.mapped_mut(allocation)
    }

    fn buffer(&self) -> BufferHandle {
        self.inner.buffer()
    }

    fn capacity(&self) -> u64 {
        self.inner.capacity()
    }
}

pub fn scripted_cache(
    capacity: u64,
    config: BufferCacheConfig,
) -> (BufferCache<ScriptedRing>, Rc<RingScript>) {
    let (ring, script) = ScriptedRing::new(capacity, 256);
    (BufferCache::new(ring, config), script)
}

/// Route the cache's `tracing` output to the test harness so failures show the scavenge path.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Encode `values` the way the guest stores them.
#[allow(dead_code)]
pub fn be_u16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

#[allow(dead_code)]
pub fn be_u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}
