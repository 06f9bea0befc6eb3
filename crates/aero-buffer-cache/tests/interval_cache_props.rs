#![cfg(not(target_arch = "wasm32"))]

use aero_buffer_cache::IntervalCache;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert { address: u32, length: u32, offset: u64 },
    Find { address: u32, length: u32 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    // A small address space so ranges collide often.
    prop_oneof![
        (0u32..0x400, 1u32..0x100, 0u64..0x10_0000).prop_map(|(address, length, offset)| {
            Op::Insert {
                address,
                length,
                offset,
            }
        }),
        (0u32..0x500, 0u32..0x100).prop_map(|(address, length)| Op::Find { address, length }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn hits_are_backed_by_a_covering_entry(ops in proptest::collection::vec(arb_op(), 1..64)) {
        let mut cache = IntervalCache::new();

        for op in ops {
            match op {
                Op::Insert { address, length, offset } => {
                    cache.insert(address, length, offset);
                    prop_assert_eq!(cache.find(address, length), Some(offset));
                }
                Op::Find { address, length } => {
                    let Some(found) = cache.find(address, length) else {
                        continue;
                    };
                    let end = u64::from(address) + u64::from(length);
                    let covering = cache.iter().find(|(start, entry)| {
                        *start <= address
                            && u64::from(*start) + u64::from(entry.guest_length) >= end
                            && entry.gpu_offset + u64::from(address - *start) == found
                    });
                    prop_assert!(covering.is_some(), "hit at {found:#x} with no covering entry");
                }
            }
        }
    }

    #[test]
    fn keys_stay_unique_and_ordered(ops in proptest::collection::vec(arb_op(), 1..64)) {
        let mut cache = IntervalCache::new();
        for op in ops {
            if let Op::Insert { address, length, offset } = op {
                cache.insert(address, length, offset);
            }
        }
        let keys: Vec<u32> = cache.iter().map(|(start, _)| start).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(keys.len(), cache.len());
    }
}
