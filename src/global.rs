//! Process-wide entry points over the program break.
//!
//! There is one shared heap for the whole process and one private arena per
//! thread, created the first time that thread calls an unlocked allocation.
//! Each policy gets its own set of functions in [`first_fit`] and
//! [`best_fit`]. Both sets work on the same shared heap and the same
//! per-thread arenas, so memory from one may be freed through the other as
//! long as the locked/unlocked flavour matches. Failures come back as null
//! pointers, as with a conventional `malloc`.

use std::{
    cell::Cell,
    ptr::{self, NonNull},
};

use crate::{
    arena::Arena, error::AllocError, heap::Heap, kernel::ProgramBreak, placement::Placement,
};

static HEAP: Heap<ProgramBreak> = Heap::new(ProgramBreak::new(), Placement::BestFit);

thread_local! {
    static LOCAL: Cell<Arena> = const { Cell::new(Arena::new()) };
}

fn or_null(result: Result<NonNull<u8>, AllocError>) -> *mut u8 {
    result.map_or(ptr::null_mut(), NonNull::as_ptr)
}

fn malloc_locked(size: usize, placement: Placement) -> *mut u8 {
    or_null(HEAP.allocate_with(size, placement))
}

unsafe fn free_locked(ptr: *mut u8) {
    if let Some(ptr) = NonNull::new(ptr) {
        unsafe { HEAP.release(ptr) }
    }
}

fn malloc_unlocked(size: usize, placement: Placement) -> *mut u8 {
    LOCAL
        .try_with(|local| {
            let mut arena = local.get();
            let result = HEAP.allocate_local(&mut arena, size, placement);
            local.set(arena);
            or_null(result)
        })
        .unwrap_or(ptr::null_mut())
}

unsafe fn free_unlocked(ptr: *mut u8) {
    let Some(ptr) = NonNull::new(ptr) else {
        return;
    };

    // During thread teardown the block is simply leaked.
    let _ = LOCAL.try_with(|local| {
        let mut arena = local.get();
        unsafe { arena.release(ptr) };
        local.set(arena);
    });
}

/// First-fit placement: the lowest-addressed free block that is big enough.
pub mod first_fit {
    use crate::placement::Placement;

    /// Allocates `size` bytes from the shared heap, serialized with every
    /// other locked call. Returns null when the program break cannot grow.
    pub fn malloc_locked(size: usize) -> *mut u8 {
        super::malloc_locked(size, Placement::FirstFit)
    }

    /// Releases memory obtained from a locked allocation. Null is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from a `malloc_locked` of this module or of
    /// [`super::best_fit`], and not be freed twice.
    pub unsafe fn free_locked(ptr: *mut u8) {
        unsafe { super::free_locked(ptr) }
    }

    /// Allocates `size` bytes from the calling thread's private arena. Only
    /// heap growth takes the shared lock. Returns null when the program break
    /// cannot grow, or when called while the thread is being torn down.
    pub fn malloc_unlocked(size: usize) -> *mut u8 {
        super::malloc_unlocked(size, Placement::FirstFit)
    }

    /// Releases memory obtained from an unlocked allocation on the same
    /// thread. Null is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from a `malloc_unlocked` on the calling
    /// thread, and not be freed twice.
    pub unsafe fn free_unlocked(ptr: *mut u8) {
        unsafe { super::free_unlocked(ptr) }
    }
}

/// Best-fit placement: the smallest free block that is big enough.
pub mod best_fit {
    use crate::placement::Placement;

    /// Allocates `size` bytes from the shared heap, serialized with every
    /// other locked call. Returns null when the program break cannot grow.
    pub fn malloc_locked(size: usize) -> *mut u8 {
        super::malloc_locked(size, Placement::BestFit)
    }

    /// # Safety
    ///
    /// `ptr` must be null or come from a `malloc_locked` of this module or of
    /// [`super::first_fit`], and not be freed twice.
    pub unsafe fn free_locked(ptr: *mut u8) {
        unsafe { super::free_locked(ptr) }
    }

    /// Allocates `size` bytes from the calling thread's private arena.
    pub fn malloc_unlocked(size: usize) -> *mut u8 {
        super::malloc_unlocked(size, Placement::BestFit)
    }

    /// # Safety
    ///
    /// `ptr` must be null or come from a `malloc_unlocked` on the calling
    /// thread, and not be freed twice.
    pub unsafe fn free_unlocked(ptr: *mut u8) {
        unsafe { super::free_unlocked(ptr) }
    }
}

/// Free bytes in the shared heap. Thread-local arenas are not counted.
pub fn total_free_bytes() -> usize {
    HEAP.total_free_bytes()
}

/// Largest free block in the shared heap, 0 if there is none.
pub fn largest_free_block() -> usize {
    HEAP.largest_free_block()
}
