//! Read-only views over a free list. These are diagnostics: nothing in the
//! allocator makes decisions based on them.

use crate::{block::Block, freelist::FreeList};

/// A free block as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Address of the block header.
    pub addr: usize,
    /// Usable bytes, excluding the header.
    pub size: usize,
}

impl FreeBlock {
    /// First address past the usable region.
    pub fn end(&self) -> usize {
        self.addr + crate::block::HEADER_SIZE + self.size
    }
}

/// Aggregate numbers over one free list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeStats {
    /// Sum of the usable size of every free block.
    pub free_bytes: usize,
    /// Usable size of the largest free block, 0 if there is none.
    pub largest_block: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
}

pub(crate) fn blocks(list: &FreeList) -> impl Iterator<Item = FreeBlock> + '_ {
    list.iter().map(|block| FreeBlock {
        addr: Block::addr(block),
        size: unsafe { block.as_ref().size },
    })
}

pub(crate) fn collect(list: &FreeList) -> FreeStats {
    blocks(list).fold(FreeStats::default(), |stats, block| FreeStats {
        free_bytes: stats.free_bytes + block.size,
        largest_block: stats.largest_block.max(block.size),
        free_blocks: stats.free_blocks + 1,
    })
}
