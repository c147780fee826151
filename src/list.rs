use std::{marker::PhantomData, ptr::NonNull};

use crate::block::Block;

/// Non-null pointer to `T`.
pub(crate) type Link<T> = Option<NonNull<T>>;

/// Walks a chain of [`Block`]s through their `next` links.
///
/// The iterator yields raw block pointers rather than references: the caller
/// (the allocator) is the only one who knows whether the memory may be
/// mutated while walking.
pub(crate) struct Iter<'a> {
    current: Link<Block>,
    marker: PhantomData<&'a Block>,
}

impl Iter<'_> {
    pub fn new(head: Link<Block>) -> Self {
        Self {
            current: head,
            marker: PhantomData,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = NonNull<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;

        unsafe {
            self.current = node.as_ref().next;
        }

        Some(node)
    }
}

/// Links `node` between `prev` and `next`, updating both neighbours.
///
/// Returns the new head when `node` becomes the first element, `None` otherwise.
///
/// **SAFETY**: all given pointers must refer to initialized headers and `prev`
/// and `next` must be consecutive in the chain (or absent at its ends).
pub(crate) unsafe fn link(
    mut node: NonNull<Block>,
    prev: Link<Block>,
    next: Link<Block>,
) -> Link<Block> {
    unsafe {
        node.as_mut().prev = prev;
        node.as_mut().next = next;

        if let Some(mut next) = next {
            next.as_mut().prev = Some(node);
        }

        match prev {
            Some(mut prev) => {
                prev.as_mut().next = Some(node);
                None
            }
            None => Some(node),
        }
    }
}

/// Unlinks `node` from its neighbours and detaches it.
///
/// Returns `Some(next)` when `node` was the head, so the owner can move its
/// root, `None` otherwise.
///
/// **SAFETY**: `node` must currently be part of a well formed chain.
pub(crate) unsafe fn unlink(mut node: NonNull<Block>) -> Option<Link<Block>> {
    unsafe {
        let (prev, next) = (node.as_ref().prev, node.as_ref().next);

        if let Some(mut next) = next {
            next.as_mut().prev = prev;
        }

        let new_head = match prev {
            Some(mut prev) => {
                prev.as_mut().next = next;
                None
            }
            None => Some(next),
        };

        node.as_mut().detach();
        new_head
    }
}
