//! Read-only access to the Xenos register file at draw time.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

pub const REGISTER_COUNT: usize = 0x5003;

pub const VGT_MULTI_PRIM_IB_RESET_INDX: u32 = 0x2103;
pub const PA_SU_SC_MODE_CNTL: u32 = 0x2205;
pub const SHADER_CONSTANT_000_X: u32 = 0x4000;
pub const SHADER_CONSTANT_BOOL_000_031: u32 = 0x4900;
pub const SHADER_CONSTANT_LOOP_00: u32 = 0x4908;

pub const FLOAT_CONSTANT_COUNT: usize = 512;
pub const BOOL_CONSTANT_WORDS: usize = 8;
pub const LOOP_CONSTANT_COUNT: usize = 32;

/// `PA_SU_SC_MODE_CNTL` bit enabling multi-primitive index buffer reset.
const PRIMITIVE_RESET_ENABLE: u32 = 1 << 21;

/// Size of the constant register blob bound to both shader stages.
pub const CONSTANT_REGISTER_UNIFORM_RANGE: u64 =
    (FLOAT_CONSTANT_COUNT * 16 + BOOL_CONSTANT_WORDS * 4 + LOOP_CONSTANT_COUNT * 4) as u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterFileError {
    #[error("register range 0x{start:x}+{count} exceeds register file of {len} entries")]
    OutOfRange { start: u32, count: usize, len: usize },
}

pub trait RegisterFile {
    /// Raw 32-bit register values indexed by register number.
    fn values(&self) -> &[u32];

    fn register(&self, index: u32) -> u32 {
        self.values().get(index as usize).copied().unwrap_or(0)
    }

    fn range(&self, start: u32, count: usize) -> Result<&[u32], RegisterFileError> {
        let values = self.values();
        let begin = start as usize;
        begin
            .checked_add(count)
            .and_then(|end| values.get(begin..end))
            .ok_or(RegisterFileError::OutOfRange {
                start,
                count,
                len: values.len(),
            })
    }

    fn primitive_restart_enabled(&self) -> bool {
        self.register(PA_SU_SC_MODE_CNTL) & PRIMITIVE_RESET_ENABLE != 0
    }

    fn primitive_restart_index(&self) -> u32 {
        self.register(VGT_MULTI_PRIM_IB_RESET_INDX)
    }
}

/// Owned copy of the register file.
#[derive(Clone, Debug)]
pub struct RegisterSnapshot {
    values: Box<[u32]>,
}

impl Default for RegisterSnapshot {
    fn default() -> Self {
        Self {
            values: vec![0u32; REGISTER_COUNT].into_boxed_slice(),
        }
    }
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: u32, value: u32) {
        self.values[index as usize] = value;
    }

    pub fn set_float_constant(&mut self, index: usize, value: [f32; 4]) {
        assert!(index < FLOAT_CONSTANT_COUNT);
        let base = SHADER_CONSTANT_000_X as usize + index * 4;
        for (slot, v) in self.values[base..base + 4].iter_mut().zip(value) {
            *slot = v.to_bits();
        }
    }

    pub fn set_bool_constants(&mut self, word: usize, bits: u32) {
        assert!(word < BOOL_CONSTANT_WORDS);
        self.values[SHADER_CONSTANT_BOOL_000_031 as usize + word] = bits;
    }

    pub fn set_loop_constant(&mut self, index: usize, value: u32) {
        assert!(index < LOOP_CONSTANT_COUNT);
        self.values[SHADER_CONSTANT_LOOP_00 as usize + index] = value;
    }

    pub fn set_primitive_restart(&mut self, enabled: bool, index: u32) {
        let cntl = &mut self.values[PA_SU_SC_MODE_CNTL as usize];
        if enabled {
            *cntl |= PRIMITIVE_RESET_ENABLE;
        } else {
            *cntl &= !PRIMITIVE_RESET_ENABLE;
        }
        self.values[VGT_MULTI_PRIM_IB_RESET_INDX as usize] = index;
    }
}

impl RegisterFile for RegisterSnapshot {
    fn values(&self) -> &[u32] {
        &self.values
    }
}

/// Every shader constant in one uniform block:
///
/// ```text
/// struct {
///   vec4 float[512];
///   uint bool[8];
///   uint loop[32];
/// };
/// ```
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ConstantRegisterBlob {
    pub float_constants: [[f32; 4]; FLOAT_CONSTANT_COUNT],
    pub bool_constants: [u32; BOOL_CONSTANT_WORDS],
    pub loop_constants: [u32; LOOP_CONSTANT_COUNT],
}

const _: () = assert!(
    core::mem::size_of::<ConstantRegisterBlob>() as u64 == CONSTANT_REGISTER_UNIFORM_RANGE
);

impl ConstantRegisterBlob {
    /// Copy the current constants out of `registers`, in register order and without swapping.
    pub fn capture(registers: &impl RegisterFile) -> Result<Self, RegisterFileError> {
        let mut blob = Self::zeroed();

        let floats = registers.range(SHADER_CONSTANT_000_X, FLOAT_CONSTANT_COUNT * 4)?;
        bytemuck::cast_slice_mut::<[f32; 4], u32>(&mut blob.float_constants)
            .copy_from_slice(floats);
        blob.bool_constants
            .copy_from_slice(registers.range(SHADER_CONSTANT_BOOL_000_031, BOOL_CONSTANT_WORDS)?);
        blob.loop_constants
            .copy_from_slice(registers.range(SHADER_CONSTANT_LOOP_00, LOOP_CONSTANT_COUNT)?);

        Ok(blob)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl std::fmt::Debug for ConstantRegisterBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantRegisterBlob")
            .field("float_constants", &format_args!("[[f32; 4]; {FLOAT_CONSTANT_COUNT}]"))
            .field("bool_constants", &self.bool_constants)
            .field("loop_constants", &self.loop_constants)
            .finish()
    }
}

/// Xenos index buffer element formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Int16,
    Int32,
}

impl IndexFormat {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Int16),
            1 => Some(Self::Int32),
            _ => None,
        }
    }

    pub fn element_size(self) -> u32 {
        match self {
            Self::Int16 => 2,
            Self::Int32 => 4,
        }
    }
}

impl TryFrom<u32> for IndexFormat {
    type Error = crate::UploadError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_u32(raw).ok_or(crate::UploadError::UnsupportedIndexFormat(raw))
    }
}
