//! This file contains all the helper functions for the allocator.
//! This are functions that don't particularly belong to any concrete module of the program.

use std::mem;

use crate::block::HEADER_SIZE;

/// Allocation granule. Payload sizes are always a multiple of this, which
/// keeps every header and payload pointer-aligned.
pub const WORD: usize = mem::size_of::<usize>();

/// It aligns `to_be_aligned` using `aligment`, or returns `None` on overflow.
///
/// `aligment` must be a power of two.
pub(crate) const fn align(to_be_aligned: usize, aligment: usize) -> Option<usize> {
    match to_be_aligned.checked_add(aligment - 1) {
        Some(bumped) => Some(bumped & !(aligment - 1)),
        None => None,
    }
}

/// Usable size actually reserved for a request of `size` bytes.
///
/// A zero-byte request is served as a one-byte request, and everything is
/// rounded up to [`WORD`].
pub(crate) fn request_size(size: usize) -> Option<usize> {
    align(size.max(1), WORD)
}

/// Bytes the heap has to grow by to hold a fresh block of `size` usable bytes.
pub(crate) fn grow_size(size: usize) -> Option<usize> {
    size.checked_add(HEADER_SIZE)
}
