use std::ptr::NonNull;

use crate::{
    block::{Block, HEADER_SIZE},
    freelist::FreeList,
    list::Link,
    placement::Placement,
    stats::{self, FreeBlock, FreeStats},
};

/// One independent heap, i.e. a free list. The placement policy is chosen per
/// search, so one arena can serve first-fit and best-fit requests alike.
///
/// The arena does not know where its memory comes from. Fresh blocks are
/// grown by the owner (see [`crate::Heap`]) and handed straight to the caller;
/// they only enter the free list once released.
#[derive(Clone, Copy)]
pub(crate) struct Arena {
    free_list: FreeList,
}

impl Arena {
    pub const fn new() -> Self {
        Self {
            free_list: FreeList::new(),
        }
    }

    /// Looks for a free block of at least `size` usable bytes.
    pub fn find(&self, placement: Placement, size: usize) -> Link<Block> {
        placement.find(&self.free_list, size)
    }

    /// Takes `block` out of the free list to serve a request of `size` bytes
    /// and returns the payload pointer.
    ///
    /// If what is left after carving `size` bytes and a new header is non
    /// empty, it stays in the list as a new block at the same position.
    /// Otherwise the whole block is handed out and the slack becomes internal
    /// padding.
    ///
    /// **SAFETY**: `block` must be a member of this arena's free list with
    /// `block.size >= size`, and `size` must be a multiple of the word size.
    pub unsafe fn reuse(&mut self, mut block: NonNull<Block>, size: usize) -> NonNull<u8> {
        unsafe {
            let available = block.as_ref().size;
            let remainder = available
                .checked_sub(size)
                .and_then(|left| left.checked_sub(HEADER_SIZE))
                .filter(|&left| left > 0);

            match remainder {
                Some(remainder) => {
                    let split_at = Block::payload(block).add(size);
                    let rest = Block::write(split_at, remainder);
                    block.as_mut().size = size;
                    self.free_list.replace(block, rest);

                    log::trace!(
                        "split {:p}: {} bytes used, {} bytes left at {:p}",
                        block,
                        size,
                        remainder,
                        rest
                    );
                }
                None => {
                    self.free_list.remove(block);
                    log::trace!("reused {:p} whole ({} of {} bytes)", block, size, available);
                }
            }

            Block::payload(block)
        }
    }

    /// Returns the block behind `payload` to the free list and merges it with
    /// any address-adjacent free neighbour.
    ///
    /// **SAFETY**: `payload` must come from this arena and not be released
    /// twice.
    pub unsafe fn release(&mut self, payload: NonNull<u8>) {
        unsafe {
            let mut block = Block::from_payload(payload);
            log::trace!("release {:p} ({} bytes)", block, block.as_ref().size);

            self.free_list.insert(block);
            self.merge_with_prev(&mut block);
            self.merge_with_next(block);
        }
    }

    /// Tries to merge `node` into the free block right before it. On success
    /// `node` is updated to point at the merged block.
    unsafe fn merge_with_prev(&mut self, node: &mut NonNull<Block>) {
        unsafe {
            let Some(mut prev) = node.as_ref().prev else {
                return;
            };

            if Block::end(prev) == Block::addr(*node) {
                // We need to cover the header and the actual content of the block
                prev.as_mut().size += HEADER_SIZE + node.as_ref().size;
                self.free_list.remove(*node);
                log::trace!("merged {:p} into previous {:p}", *node, prev);

                *node = prev;
            }
        }
    }

    /// Tries to absorb the free block right after `node`.
    unsafe fn merge_with_next(&mut self, mut node: NonNull<Block>) {
        unsafe {
            let Some(next) = node.as_ref().next else {
                return;
            };

            if Block::end(node) == Block::addr(next) {
                node.as_mut().size += HEADER_SIZE + next.as_ref().size;
                self.free_list.remove(next);
                log::trace!("merged next {:p} into {:p}", next, node);
            }
        }
    }

    pub fn stats(&self) -> FreeStats {
        stats::collect(&self.free_list)
    }

    pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
        stats::blocks(&self.free_list)
    }
}
