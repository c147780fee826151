mod common;

use std::ptr::NonNull;

use common::{Lcg, assert_disjoint, assert_well_formed};
use tsmalloc::{FixedHeap, FreeBlock, HEADER_SIZE, Heap, Placement, WORD};

const POLICIES: [Placement; 2] = [Placement::FirstFit, Placement::BestFit];

fn heap(placement: Placement) -> Heap<FixedHeap> {
    Heap::new(FixedHeap::reserve(8 << 20).unwrap(), placement)
}

fn free_blocks(heap: &Heap<FixedHeap>) -> Vec<FreeBlock> {
    let mut blocks = Vec::new();
    heap.for_each_free_block(|block| blocks.push(block));
    blocks
}

fn sizes(heap: &Heap<FixedHeap>) -> Vec<usize> {
    free_blocks(heap).iter().map(|block| block.size).collect()
}

#[test]
fn release_then_allocate_reuses_address() {
    for placement in POLICIES {
        let heap = heap(placement);
        let _before = heap.allocate(40).unwrap();
        let ptr = heap.allocate(100).unwrap();
        let _after = heap.allocate(40).unwrap();

        unsafe { heap.release(ptr) };
        assert_eq!(heap.allocate(100).unwrap(), ptr, "{placement:?}");
        assert!(free_blocks(&heap).is_empty());
    }
}

#[test]
fn best_fit_picks_the_tightest_block() {
    // Free blocks of 10, 50 and 20 words, kept apart by live guards.
    let unit = 8 * WORD;
    let request = 15 * unit / 10;

    for placement in POLICIES {
        let heap = heap(placement);
        let mut free = Vec::new();
        for size in [unit, 5 * unit, 2 * unit] {
            free.push(heap.allocate(size).unwrap());
            heap.allocate(WORD).unwrap();
        }
        for &ptr in &free {
            unsafe { heap.release(ptr) };
        }
        assert_eq!(sizes(&heap), vec![unit, 5 * unit, 2 * unit]);

        let chosen = heap.allocate(request).unwrap();
        let expected = match placement {
            Placement::BestFit => free[2],
            Placement::FirstFit => free[1],
        };
        assert_eq!(chosen, expected, "{placement:?}");
    }
}

#[test]
fn adjacent_releases_coalesce_in_any_order() {
    for reversed in [false, true] {
        let heap = heap(Placement::BestFit);
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(100).unwrap();

        unsafe {
            if reversed {
                heap.release(b);
                heap.release(a);
            } else {
                heap.release(a);
                heap.release(b);
            }
        }

        let blocks = free_blocks(&heap);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].size >= 200 + HEADER_SIZE);
        assert_eq!(blocks[0].addr + HEADER_SIZE, a.as_ptr() as usize);
    }
}

#[test]
fn split_only_when_remainder_holds_data() {
    let s = 6 * WORD;

    for (slack, expected) in [(HEADER_SIZE, vec![]), (HEADER_SIZE + WORD, vec![WORD])] {
        let heap = heap(Placement::FirstFit);
        let big = heap.allocate(s + slack).unwrap();
        heap.allocate(WORD).unwrap();
        unsafe { heap.release(big) };

        assert_eq!(heap.allocate(s).unwrap(), big);
        assert_eq!(sizes(&heap), expected);
    }
}

#[test]
fn zero_sized_requests_get_a_word() {
    let heap = heap(Placement::BestFit);
    let a = heap.allocate(0).unwrap();
    let b = heap.allocate(0).unwrap();

    assert_ne!(a, b);
    assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, HEADER_SIZE + WORD);
    assert_eq!(a.as_ptr() as usize % WORD, 0);
}

#[test]
fn out_of_memory_leaves_heap_usable() {
    let mut storage = vec![0usize; 64];
    let base = NonNull::new(storage.as_mut_ptr().cast::<u8>()).unwrap();
    let heap = Heap::new(unsafe { FixedHeap::new(base, 64 * WORD) }, Placement::BestFit);

    let a = heap.allocate(16 * WORD).unwrap();
    assert!(heap.allocate(64 * WORD).is_err());

    unsafe { heap.release(a) };
    assert_eq!(heap.allocate(8 * WORD).unwrap(), a);
    assert_well_formed(&free_blocks(&heap));
}

#[test]
fn random_sequences_keep_invariants() {
    for placement in POLICIES {
        let heap = heap(placement);
        let mut rng = Lcg::new(7);
        let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

        for step in 0..4000 {
            if live.is_empty() || rng.below(3) != 0 {
                let size = 1 + rng.below(300);
                let ptr = heap.allocate(size).unwrap();
                unsafe { ptr.as_ptr().write_bytes(step as u8, size) };
                live.push((ptr, size));
            } else {
                let (ptr, _) = live.swap_remove(rng.below(live.len()));
                unsafe { heap.release(ptr) };
            }

            if step % 250 == 0 {
                let blocks = free_blocks(&heap);
                assert_well_formed(&blocks);

                let mut ranges: Vec<_> = blocks
                    .iter()
                    .map(|block| (block.addr, block.end()))
                    .collect();
                ranges.extend(live.iter().map(|&(ptr, size)| {
                    let start = ptr.as_ptr() as usize;
                    (start - HEADER_SIZE, start + size)
                }));
                assert_disjoint(ranges);
            }
        }

        let used: usize = live.iter().map(|&(_, size)| size + HEADER_SIZE).sum();
        let free: usize = free_blocks(&heap).iter().map(|b| b.size + HEADER_SIZE).sum();
        assert!(used + free <= heap.grown_bytes());

        for (ptr, _) in live.drain(..) {
            unsafe { heap.release(ptr) };
        }

        // A fixed heap is contiguous, so everything folds back into one block.
        let blocks = free_blocks(&heap);
        assert_eq!(blocks.len(), 1, "{placement:?}");
        assert_eq!(blocks[0].size + HEADER_SIZE, heap.grown_bytes());
    }
}

#[test]
fn data_survives_neighbouring_traffic() {
    let heap = heap(Placement::FirstFit);
    let keep = heap.allocate(64).unwrap();
    unsafe { keep.as_ptr().write_bytes(0x5A, 64) };

    let mut others = Vec::new();
    for size in [8, 200, 16, 64, 24] {
        others.push(heap.allocate(size).unwrap());
    }
    for ptr in others.drain(..).rev() {
        unsafe { heap.release(ptr) };
    }
    for size in [100, 30, 70] {
        let ptr = heap.allocate(size).unwrap();
        unsafe { ptr.as_ptr().write_bytes(0xFF, size) };
    }

    let bytes = unsafe { std::slice::from_raw_parts(keep.as_ptr(), 64) };
    assert!(bytes.iter().all(|&b| b == 0x5A));
}
