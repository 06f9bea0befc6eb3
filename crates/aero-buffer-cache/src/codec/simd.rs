//! 128-bit vector swapper: SSE2 on x86_64, NEON on little-endian aarch64.
//!
//! Both instruction sets are part of the target baseline, so no runtime detection is needed. Each
//! routine handles whole 16-byte blocks with vector ops and hands the remainder to
//! [`ScalarSwapper`].

// Newer toolchains treat baseline-feature intrinsics as safe to call.
#![allow(unused_unsafe)]

use super::{element_spans, ByteSwapper, ScalarSwapper};

const BLOCK: usize = 16;

#[cfg(target_arch = "x86_64")]
mod imp {
    use std::arch::x86_64::*;

    pub(super) type Vector = __m128i;

    #[inline(always)]
    pub(super) fn load(bytes: &[u8]) -> Vector {
        debug_assert_eq!(bytes.len(), super::BLOCK);
        // SAFETY: `bytes` holds 16 readable bytes and loadu has no alignment requirement.
        unsafe { _mm_loadu_si128(bytes.as_ptr().cast()) }
    }

    #[inline(always)]
    pub(super) fn store(bytes: &mut [u8], v: Vector) {
        debug_assert_eq!(bytes.len(), super::BLOCK);
        // SAFETY: `bytes` holds 16 writable bytes and storeu has no alignment requirement.
        unsafe { _mm_storeu_si128(bytes.as_mut_ptr().cast(), v) }
    }

    #[inline(always)]
    pub(super) fn bswap16(v: Vector) -> Vector {
        unsafe { _mm_or_si128(_mm_slli_epi16::<8>(v), _mm_srli_epi16::<8>(v)) }
    }

    #[inline(always)]
    pub(super) fn swap_halves32(v: Vector) -> Vector {
        // 0xB1 = (2, 3, 0, 1): exchange adjacent 16-bit lanes.
        unsafe { _mm_shufflehi_epi16::<0xB1>(_mm_shufflelo_epi16::<0xB1>(v)) }
    }

    #[inline(always)]
    pub(super) fn bswap32(v: Vector) -> Vector {
        bswap16(swap_halves32(v))
    }

    #[inline(always)]
    pub(super) fn splat16(value: u16) -> Vector {
        unsafe { _mm_set1_epi16(value as i16) }
    }

    #[inline(always)]
    pub(super) fn splat32(value: u32) -> Vector {
        unsafe { _mm_set1_epi32(value as i32) }
    }

    #[inline(always)]
    pub(super) fn fill_eq16(v: Vector, sentinel: Vector) -> Vector {
        unsafe { _mm_or_si128(v, _mm_cmpeq_epi16(v, sentinel)) }
    }

    #[inline(always)]
    pub(super) fn fill_eq32(v: Vector, sentinel: Vector) -> Vector {
        unsafe { _mm_or_si128(v, _mm_cmpeq_epi32(v, sentinel)) }
    }
}

#[cfg(target_arch = "aarch64")]
mod imp {
    use std::arch::aarch64::*;

    pub(super) type Vector = uint8x16_t;

    #[inline(always)]
    pub(super) fn load(bytes: &[u8]) -> Vector {
        debug_assert_eq!(bytes.len(), super::BLOCK);
        // SAFETY: `bytes` holds 16 readable bytes; vld1q_u8 only requires byte alignment.
        unsafe { vld1q_u8(bytes.as_ptr()) }
    }

    #[inline(always)]
    pub(super) fn store(bytes: &mut [u8], v: Vector) {
        debug_assert_eq!(bytes.len(), super::BLOCK);
        // SAFETY: `bytes` holds 16 writable bytes; vst1q_u8 only requires byte alignment.
        unsafe { vst1q_u8(bytes.as_mut_ptr(), v) }
    }

    #[inline(always)]
    pub(super) fn bswap16(v: Vector) -> Vector {
        unsafe { vrev16q_u8(v) }
    }

    #[inline(always)]
    pub(super) fn swap_halves32(v: Vector) -> Vector {
        unsafe { vreinterpretq_u8_u16(vrev32q_u16(vreinterpretq_u16_u8(v))) }
    }

    #[inline(always)]
    pub(super) fn bswap32(v: Vector) -> Vector {
        unsafe { vrev32q_u8(v) }
    }

    #[inline(always)]
    pub(super) fn splat16(value: u16) -> Vector {
        unsafe { vreinterpretq_u8_u16(vdupq_n_u16(value)) }
    }

    #[inline(always)]
    pub(super) fn splat32(value: u32) -> Vector {
        unsafe { vreinterpretq_u8_u32(vdupq_n_u32(value)) }
    }

    #[inline(always)]
    pub(super) fn fill_eq16(v: Vector, sentinel: Vector) -> Vector {
        unsafe {
            let lanes = vreinterpretq_u16_u8(v);
            let mask = vceqq_u16(lanes, vreinterpretq_u16_u8(sentinel));
            vreinterpretq_u8_u16(vorrq_u16(lanes, mask))
        }
    }

    #[inline(always)]
    pub(super) fn fill_eq32(v: Vector, sentinel: Vector) -> Vector {
        unsafe {
            let lanes = vreinterpretq_u32_u8(v);
            let mask = vceqq_u32(lanes, vreinterpretq_u32_u8(sentinel));
            vreinterpretq_u8_u32(vorrq_u32(lanes, mask))
        }
    }
}

/// Apply `op` to every whole block. Returns the number of bytes processed.
#[inline(always)]
fn for_each_block(dst: &mut [u8], src: &[u8], op: impl Fn(imp::Vector) -> imp::Vector) -> usize {
    let mut done = 0;
    for (d, s) in dst.chunks_exact_mut(BLOCK).zip(src.chunks_exact(BLOCK)) {
        imp::store(d, op(imp::load(s)));
        done += BLOCK;
    }
    done
}

/// Vectorized swapper; see the module docs for the per-target instruction set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimdSwapper;

impl ByteSwapper for SimdSwapper {
    fn swap16(&self, dst: &mut [u8], src: &[u8], count: usize) {
        let (dst, src) = element_spans(dst, src, count, 2);
        let done = for_each_block(dst, src, imp::bswap16);
        ScalarSwapper.swap16(&mut dst[done..], &src[done..], (src.len() - done) / 2);
    }

    fn swap32(&self, dst: &mut [u8], src: &[u8], count: usize) {
        let (dst, src) = element_spans(dst, src, count, 4);
        let done = for_each_block(dst, src, imp::bswap32);
        ScalarSwapper.swap32(&mut dst[done..], &src[done..], (src.len() - done) / 4);
    }

    fn swap16_in_32(&self, dst: &mut [u8], src: &[u8], count: usize) {
        let (dst, src) = element_spans(dst, src, count, 4);
        let done = for_each_block(dst, src, imp::swap_halves32);
        ScalarSwapper.swap16_in_32(&mut dst[done..], &src[done..], (src.len() - done) / 4);
    }

    fn swap16_cmp(&self, dst: &mut [u8], src: &[u8], sentinel: u16, count: usize) {
        let (dst, src) = element_spans(dst, src, count, 2);
        let cmp = imp::splat16(sentinel);
        let done = for_each_block(dst, src, |v| imp::fill_eq16(imp::bswap16(v), cmp));
        ScalarSwapper.swap16_cmp(&mut dst[done..], &src[done..], sentinel, (src.len() - done) / 2);
    }

    fn swap32_cmp(&self, dst: &mut [u8], src: &[u8], sentinel: u32, count: usize) {
        let (dst, src) = element_spans(dst, src, count, 4);
        let cmp = imp::splat32(sentinel);
        let done = for_each_block(dst, src, |v| imp::fill_eq32(imp::bswap32(v), cmp));
        ScalarSwapper.swap32_cmp(&mut dst[done..], &src[done..], sentinel, (src.len() - done) / 4);
    }
}
