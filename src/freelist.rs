use std::ptr::NonNull;

use crate::{
    block::Block,
    list::{self, Iter, Link},
};

/// Address-ordered, doubly linked list of free [`Block`]s.
///
/// The list owns no memory of its own: the links live inside the headers of
/// the free blocks, so the only state here is the root pointer.
///
/// ```text
///                           Free List
///
///  root        next                       next
///   |     +-------------+         +--------------------+
///   v     |             v         |                    v
/// +-------|-----+   +-----------+ | +-------------+   +-------------+
/// | Block(free) |   | allocated | | | Block(free) |   | Block(free) |
/// +-------------+   +-----------+ | +-------------+   +-------------+
///                                 +---------^
/// ```
///
/// # Invariants
/// - Blocks are sorted strictly by ascending header address.
/// - Once an operation completes no two blocks are address-adjacent, they are
///   always merged (see [`crate::arena::Arena::release`]).
/// - Blocks that are not in the list have `prev`/`next` cleared.
#[derive(Clone, Copy)]
pub(crate) struct FreeList {
    root: Link<Block>,
}

impl FreeList {
    /// Creates a new empty list.
    pub const fn new() -> Self {
        Self { root: None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self.root)
    }

    /// Inserts `block` at its address-sorted position: before the first block
    /// with a greater address, or at the tail.
    ///
    /// **SAFETY**: `block` must be an initialized header that is not already
    /// in this (or any other) list.
    pub unsafe fn insert(&mut self, block: NonNull<Block>) {
        let mut prev: Link<Block> = None;
        let mut current = self.root;

        while let Some(node) = current {
            if node > block {
                break;
            }
            prev = current;
            current = unsafe { node.as_ref().next };
        }

        unsafe { self.link(block, prev, current) }
    }

    /// Removes `block` from the list and detaches it.
    ///
    /// **SAFETY**: `block` must currently be a member of this list.
    pub unsafe fn remove(&mut self, block: NonNull<Block>) {
        if let Some(head) = unsafe { list::unlink(block) } {
            self.root = head;
        }
    }

    /// Puts `new` at the exact position `old` occupied and detaches `old`.
    ///
    /// Used when splitting: the remainder lives between `old` and its
    /// successor, so the address ordering is preserved.
    ///
    /// **SAFETY**: `old` must be a member of this list, `new` must not be, and
    /// `new` must sit strictly between `old` and `old.next` by address.
    pub unsafe fn replace(&mut self, mut old: NonNull<Block>, new: NonNull<Block>) {
        unsafe {
            let (prev, next) = (old.as_ref().prev, old.as_ref().next);
            old.as_mut().detach();
            self.link(new, prev, next);
        }
    }

    unsafe fn link(&mut self, block: NonNull<Block>, prev: Link<Block>, next: Link<Block>) {
        if let Some(head) = unsafe { list::link(block, prev, next) } {
            self.root = Some(head);
        }
    }
}

// Free blocks are only reachable through the arena that owns the list.
unsafe impl Send for FreeList {}
