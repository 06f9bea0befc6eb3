#![cfg(not(target_arch = "wasm32"))]

use aero_buffer_cache::codec::{self, ByteSwapper, Endian, ScalarSwapper};
use proptest::prelude::*;

prop_compose! {
    // Guest bytes plus a misaligned window into them.
    fn arb_window(max_elements: usize, width: usize)(
        bytes in proptest::collection::vec(any::<u8>(), width..=max_elements * width + 15),
        skew in 0usize..16,
    ) -> (Vec<u8>, usize) {
        let skew = skew.min(bytes.len() - width);
        (bytes, skew)
    }
}

fn run(op: impl Fn(&dyn ByteSwapper, &mut [u8], &[u8]), src: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let native = codec::native();
    let mut expected = vec![0u8; src.len()];
    let mut actual = vec![0u8; src.len()];
    op(&ScalarSwapper, &mut expected[..], src);
    op(&native, &mut actual[..], src);
    (expected, actual)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn native_swap16_matches_scalar((bytes, skew) in arb_window(64, 2), sentinel in any::<u16>()) {
        let src = &bytes[skew..];
        let count = src.len() / 2;

        let (expected, actual) = run(|s, d, src| s.swap16(d, src, count), src);
        prop_assert_eq!(expected, actual);

        let (expected, actual) = run(|s, d, src| s.swap16_cmp(d, src, sentinel, count), src);
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn native_swap32_matches_scalar((bytes, skew) in arb_window(64, 4), sentinel in any::<u32>()) {
        let src = &bytes[skew..];
        let count = src.len() / 4;

        let (expected, actual) = run(|s, d, src| s.swap32(d, src, count), src);
        prop_assert_eq!(expected, actual);

        let (expected, actual) = run(|s, d, src| s.swap16_in_32(d, src, count), src);
        prop_assert_eq!(expected, actual);

        let (expected, actual) = run(|s, d, src| s.swap32_cmp(d, src, sentinel, count), src);
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn sentinel16_hits_become_all_ones(
        values in proptest::collection::vec(prop_oneof![Just(0xBEEFu16), any::<u16>()], 1..80),
    ) {
        let src: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let mut out = vec![0u8; src.len()];
        codec::native().swap16_cmp(&mut out, &src, 0xBEEF, values.len());

        for (value, pair) in values.iter().zip(out.chunks_exact(2)) {
            let got = u16::from_le_bytes([pair[0], pair[1]]);
            let want = if *value == 0xBEEF { u16::MAX } else { *value };
            prop_assert_eq!(got, want);
        }
    }

    #[test]
    fn sentinel32_hits_become_all_ones(
        sentinel in prop_oneof![Just(0u32), Just(0xFFFF_FFFE), any::<u32>()],
        picks in proptest::collection::vec(any::<bool>(), 1..40),
        noise in proptest::collection::vec(any::<u32>(), 40),
    ) {
        let values: Vec<u32> = picks
            .iter()
            .zip(&noise)
            .map(|(&hit, &other)| if hit { sentinel } else { other })
            .collect();
        let src: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();

        let native = codec::native();
        for swapper in [&ScalarSwapper as &dyn ByteSwapper, &native] {
            let mut out = vec![0u8; src.len()];
            swapper.swap32_cmp(&mut out, &src, sentinel, values.len());

            for (value, word) in values.iter().zip(out.chunks_exact(4)) {
                let got = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                let want = if *value == sentinel { u32::MAX } else { *value };
                prop_assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn copy_swapped_preserves_partial_tail(
        bytes in proptest::collection::vec(any::<u8>(), 0..70),
        mode in prop_oneof![Just(Endian::Swap8In32), Just(Endian::Swap16In32), Just(Endian::Swap8In16)],
    ) {
        let mut out = vec![0u8; bytes.len()];
        codec::native().copy_swapped(mode, &mut out, &bytes, bytes.len());

        let whole = bytes.len() / mode.element_size() * mode.element_size();
        prop_assert_eq!(&out[whole..], &bytes[whole..]);

        // Applying the same involution twice restores the input.
        let mut back = vec![0u8; bytes.len()];
        codec::native().copy_swapped(mode, &mut back, &out, out.len());
        prop_assert_eq!(back, bytes);
    }
}
