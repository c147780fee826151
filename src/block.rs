use std::{mem, ptr::NonNull};

use crate::list::Link;

/// Header size of a block. Every block, free or allocated, pays this overhead
/// in front of its payload.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// This is the structure of a block. The fields of the block are it's metadata,
/// content is placed after this header.
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        |
/// |        prev         |        | -> Header
/// +---------------------+        |
/// |        next         |        |
/// +---------------------+ <------+ <- pointer handed to the caller
/// |       Content       |        |
/// |         ...         |        | -> Addressable content (`size` bytes)
/// |         ...         |        |
/// +---------------------+ <------+
/// ```
///
/// `prev` and `next` are only meaningful while the block sits in a free list.
/// Allocated blocks keep them cleared ("detached").
///
/// The header is three machine words, so as long as payload sizes are a
/// multiple of the word size (see [`crate::utils::request_size`]) every header
/// and every payload stays pointer-aligned.
#[repr(C)]
pub(crate) struct Block {
    /// Usable bytes after the header.
    pub size: usize,
    /// Previous free block by address.
    pub prev: Link<Block>,
    /// Next free block by address.
    pub next: Link<Block>,
}

impl Block {
    /// Writes a fresh, detached header at `addr` and returns it.
    ///
    /// **SAFETY**: `addr` must be pointer-aligned and valid for writes of
    /// `HEADER_SIZE + size` bytes.
    pub unsafe fn write(addr: NonNull<u8>, size: usize) -> NonNull<Block> {
        let block = addr.cast::<Block>();

        unsafe {
            block.as_ptr().write(Block {
                size,
                prev: None,
                next: None,
            });
        }

        block
    }

    /// Recovers the header that precedes a payload pointer.
    ///
    /// **SAFETY**: `payload` must have been produced by [`Block::payload`].
    #[inline]
    pub unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Block> {
        unsafe { payload.sub(HEADER_SIZE).cast() }
    }

    /// Pointer handed out to callers: `header_address + HEADER_SIZE`.
    #[inline]
    pub fn payload(block: NonNull<Block>) -> NonNull<u8> {
        unsafe { block.cast::<u8>().add(HEADER_SIZE) }
    }

    #[inline]
    pub fn addr(block: NonNull<Block>) -> usize {
        block.as_ptr() as usize
    }

    /// First address past the usable region of `block`.
    ///
    /// **SAFETY**: `block` must point to an initialized header.
    #[inline]
    pub unsafe fn end(block: NonNull<Block>) -> usize {
        unsafe { Self::addr(block) + HEADER_SIZE + block.as_ref().size }
    }

    #[inline]
    pub fn detach(&mut self) {
        self.prev = None;
        self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_three_words() {
        assert_eq!(HEADER_SIZE, 3 * mem::size_of::<usize>());
    }

    #[test]
    fn payload_round_trips_to_header() {
        let mut storage = [0usize; 8];
        let addr = NonNull::new(storage.as_mut_ptr().cast::<u8>()).unwrap();

        unsafe {
            let block = Block::write(addr, 16);
            let payload = Block::payload(block);

            assert_eq!(payload.as_ptr() as usize, Block::addr(block) + HEADER_SIZE);
            assert_eq!(Block::from_payload(payload), block);
            assert_eq!(Block::end(block), Block::addr(block) + HEADER_SIZE + 16);
            assert!(block.as_ref().prev.is_none() && block.as_ref().next.is_none());
        }
    }
}
