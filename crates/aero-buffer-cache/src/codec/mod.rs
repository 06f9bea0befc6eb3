//! Endian conversion for guest data on its way into the transient ring.
//!
//! The guest stores everything big-endian; the GPU consumes little-endian elements. Every routine
//! takes an element `count` and reads exactly `count * width` bytes from `src`, writing the same
//! number of bytes to `dst`. Neither slice has an alignment requirement.
//!
//! The `*_cmp` variants additionally replace any element whose swapped value equals the sentinel
//! with all ones. This is how a guest-configured primitive restart index is remapped to the fixed
//! restart value the host API expects.

mod scalar;

#[cfg(any(
    target_arch = "x86_64",
    all(target_arch = "aarch64", target_endian = "little")
))]
mod simd;

pub use scalar::ScalarSwapper;

#[cfg(any(
    target_arch = "x86_64",
    all(target_arch = "aarch64", target_endian = "little")
))]
pub use simd::SimdSwapper;

/// Best byte swapper available for the build target.
#[cfg(all(
    any(
        target_arch = "x86_64",
        all(target_arch = "aarch64", target_endian = "little")
    ),
    not(feature = "scalar-codec")
))]
pub type NativeSwapper = SimdSwapper;

/// Best byte swapper available for the build target.
#[cfg(not(all(
    any(
        target_arch = "x86_64",
        all(target_arch = "aarch64", target_endian = "little")
    ),
    not(feature = "scalar-codec")
)))]
pub type NativeSwapper = ScalarSwapper;

pub fn native() -> NativeSwapper {
    NativeSwapper::default()
}

/// Xenos endian swap modes, as encoded in fetch constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    None,
    Swap8In16,
    Swap8In32,
    Swap16In32,
}

impl Endian {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Swap8In16),
            2 => Some(Self::Swap8In32),
            3 => Some(Self::Swap16In32),
            _ => None,
        }
    }

    /// Size in bytes of the unit the mode operates on.
    pub fn element_size(self) -> usize {
        match self {
            Self::None => 1,
            Self::Swap8In16 => 2,
            Self::Swap8In32 | Self::Swap16In32 => 4,
        }
    }
}

impl TryFrom<u32> for Endian {
    type Error = crate::UploadError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_u32(raw).ok_or(crate::UploadError::UnsupportedEndianValue(raw))
    }
}

/// Element-wise byte-order transforms between guest and host buffers.
///
/// Implementations must produce identical output for identical input; they differ only in speed.
///
/// # Panics
///
/// Every method panics if `src` or `dst` is shorter than `count` elements.
pub trait ByteSwapper {
    /// Reverse the bytes of each 16-bit element.
    fn swap16(&self, dst: &mut [u8], src: &[u8], count: usize);

    /// Reverse the bytes of each 32-bit element.
    fn swap32(&self, dst: &mut [u8], src: &[u8], count: usize);

    /// Exchange the 16-bit halves of each 32-bit element, keeping byte order within each half.
    fn swap16_in_32(&self, dst: &mut [u8], src: &[u8], count: usize);

    /// [`ByteSwapper::swap16`], mapping elements equal to `sentinel` after the swap to `0xFFFF`.
    fn swap16_cmp(&self, dst: &mut [u8], src: &[u8], sentinel: u16, count: usize);

    /// [`ByteSwapper::swap32`], mapping elements equal to `sentinel` after the swap to
    /// `0xFFFF_FFFF`.
    fn swap32_cmp(&self, dst: &mut [u8], src: &[u8], sentinel: u32, count: usize);

    /// Transform the first `len` bytes of `src` into `dst` according to `endian`.
    ///
    /// Trailing bytes that do not form a whole element are copied unchanged.
    fn copy_swapped(&self, endian: Endian, dst: &mut [u8], src: &[u8], len: usize) {
        let count = len / endian.element_size();
        match endian {
            Endian::None => {}
            Endian::Swap8In16 => self.swap16(dst, src, count),
            Endian::Swap8In32 => self.swap32(dst, src, count),
            Endian::Swap16In32 => self.swap16_in_32(dst, src, count),
        }
        let done = count * endian.element_size();
        dst[done..len].copy_from_slice(&src[done..len]);
    }
}

/// Narrow `dst`/`src` to exactly `count` elements of `width` bytes.
pub(crate) fn element_spans<'a, 'b>(
    dst: &'a mut [u8],
    src: &'b [u8],
    count: usize,
    width: usize,
) -> (&'a mut [u8], &'b [u8]) {
    let len = count
        .checked_mul(width)
        .expect("element count overflows usize");
    assert!(
        src.len() >= len,
        "source holds {} bytes, need {len} for {count} elements",
        src.len()
    );
    assert!(
        dst.len() >= len,
        "destination holds {} bytes, need {len} for {count} elements",
        dst.len()
    );
    (&mut dst[..len], &src[..len])
}
