use super::{element_spans, ByteSwapper};

/// Portable element-at-a-time swapper. Also used for the remainder of the SIMD paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarSwapper;

impl ByteSwapper for ScalarSwapper {
    fn swap16(&self, dst: &mut [u8], src: &[u8], count: usize) {
        let (dst, src) = element_spans(dst, src, count, 2);
        for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
            d[0] = s[1];
            d[1] = s[0];
        }
    }

    fn swap32(&self, dst: &mut [u8], src: &[u8], count: usize) {
        let (dst, src) = element_spans(dst, src, count, 4);
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            let value = u32::from_be_bytes([s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&value.to_le_bytes());
        }
    }

    fn swap16_in_32(&self, dst: &mut [u8], src: &[u8], count: usize) {
        let (dst, src) = element_spans(dst, src, count, 4);
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            d[..2].copy_from_slice(&s[2..]);
            d[2..].copy_from_slice(&s[..2]);
        }
    }

    fn swap16_cmp(&self, dst: &mut [u8], src: &[u8], sentinel: u16, count: usize) {
        let (dst, src) = element_spans(dst, src, count, 2);
        for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
            let value = u16::from_be_bytes([s[0], s[1]]);
            let value = if value == sentinel { u16::MAX } else { value };
            d.copy_from_slice(&value.to_le_bytes());
        }
    }

    fn swap32_cmp(&self, dst: &mut [u8], src: &[u8], sentinel: u32, count: usize) {
        let (dst, src) = element_spans(dst, src, count, 4);
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            let value = u32::from_be_bytes([s[0], s[1], s[2], s[3]]);
            let value = if value == sentinel { u32::MAX } else { value };
            d.copy_from_slice(&value.to_le_bytes());
        }
    }
}
