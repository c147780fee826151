//! Placement policies deciding which free block serves a request.

use std::ptr::NonNull;

use crate::{block::Block, freelist::FreeList, list::Link};

/// Strategy used to pick a free block for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    /// First block in address order that is large enough.
    FirstFit,
    /// Smallest block that is large enough. On equal sizes the lower address
    /// wins. An exact match stops the scan early.
    #[default]
    BestFit,
}

impl Placement {
    /// Returns a free block able to hold `size` bytes, or `None` when the list
    /// is empty or nothing is large enough. The caller must then grow the heap.
    pub(crate) fn find(self, list: &FreeList, size: usize) -> Link<Block> {
        if list.is_empty() {
            return None;
        }

        match self {
            Self::FirstFit => first_fit(list, size),
            Self::BestFit => best_fit(list, size),
        }
    }
}

fn block_size(block: NonNull<Block>) -> usize {
    unsafe { block.as_ref().size }
}

fn first_fit(list: &FreeList, size: usize) -> Link<Block> {
    list.iter().find(|&block| block_size(block) >= size)
}

fn best_fit(list: &FreeList, size: usize) -> Link<Block> {
    let mut best: Link<Block> = None;

    for block in list.iter() {
        let candidate = block_size(block);
        if candidate < size {
            continue;
        }
        if best.is_none_or(|best| candidate < block_size(best)) {
            best = Some(block);
            if candidate == size {
                break;
            }
        }
    }

    best
}
