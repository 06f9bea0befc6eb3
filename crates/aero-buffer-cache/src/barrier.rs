//! Synchronization recorded after each upload.
//!
//! A host write into the ring is only visible to the device once the written range has been
//! flushed and a buffer barrier orders the host write before the consuming stage. The flags mirror
//! the Vulkan access/stage bits the backend translates them to.

use bitflags::bitflags;

use crate::ring::BufferHandle;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const HOST_WRITE = 1 << 0;
        const UNIFORM_READ = 1 << 1;
        const SHADER_READ = 1 << 2;
        const INDEX_READ = 1 << 3;
        const VERTEX_ATTRIBUTE_READ = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const HOST = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const ALL_COMMANDS = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// The command buffer being recorded for the current draw.
pub trait CommandRecorder {
    fn pipeline_barrier(
        &mut self,
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        barrier: BufferBarrier,
    );

    /// Flush host writes to `[offset, offset + size)` of the buffer's mapped memory.
    fn flush_mapped_range(&mut self, buffer: BufferHandle, offset: u64, size: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedCommand {
    PipelineBarrier {
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        barrier: BufferBarrier,
    },
    FlushMappedRange {
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
}

/// [`CommandRecorder`] that keeps every command in order, for tests and trace capture.
#[derive(Debug, Default)]
pub struct CommandLog {
    commands: Vec<RecordedCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn barriers(&self) -> impl Iterator<Item = &BufferBarrier> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            RecordedCommand::PipelineBarrier { barrier, .. } => Some(barrier),
            RecordedCommand::FlushMappedRange { .. } => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandRecorder for CommandLog {
    fn pipeline_barrier(
        &mut self,
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        barrier: BufferBarrier,
    ) {
        self.commands.push(RecordedCommand::PipelineBarrier {
            src_stages,
            dst_stages,
            barrier,
        });
    }

    fn flush_mapped_range(&mut self, buffer: BufferHandle, offset: u64, size: u64) {
        self.commands.push(RecordedCommand::FlushMappedRange {
            buffer,
            offset,
            size,
        });
    }
}
