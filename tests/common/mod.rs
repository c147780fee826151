#![allow(dead_code)]

use tsmalloc::FreeBlock;

/// Checks that free blocks are sorted by address and that no two of them
/// touch or overlap.
pub fn assert_well_formed(blocks: &[FreeBlock]) {
    for pair in blocks.windows(2) {
        assert!(
            pair[0].addr < pair[1].addr,
            "free list out of order: {:#x} before {:#x}",
            pair[0].addr,
            pair[1].addr
        );
        assert!(
            pair[0].end() < pair[1].addr,
            "free blocks at {:#x} and {:#x} are adjacent or overlap",
            pair[0].addr,
            pair[1].addr
        );
    }
}

/// Checks that no two `[start, end)` ranges overlap.
pub fn assert_disjoint(mut ranges: Vec<(usize, usize)>) {
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "ranges {:#x?} and {:#x?} overlap",
            pair[0],
            pair[1]
        );
    }
}

/// Small deterministic generator so stress runs are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn next(&mut self) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as usize
    }

    pub fn below(&mut self, bound: usize) -> usize {
        self.next() % bound
    }
}
