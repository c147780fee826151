use std::{
    alloc::{GlobalAlloc, Layout},
    marker::PhantomData,
    ptr::{self, NonNull},
};

use spin::Mutex;

use crate::{
    arena::Arena,
    block::{Block, HEADER_SIZE},
    error::AllocError,
    kernel::HeapSource,
    placement::Placement,
    stats::{FreeBlock, FreeStats},
    utils::{self, WORD},
};

/// A heap made of one shared, lock-protected arena plus any number of
/// thread-local arenas, all growing out of the same [`HeapSource`].
///
/// ```text
///                 +----------------- Heap -----------------+
///                 |  Mutex                                  |
///  allocate() --->|  +-----------------+   +-------------+  |
///  release()  --->|  | shared Arena    |   | HeapSource  |<-|--- LocalArena (thread 1)
///                 |  +-----------------+   +-------------+<-|--- LocalArena (thread 2)
///                 +-----------------------------------------+
/// ```
///
/// Every operation on the shared arena runs entirely under the lock. A
/// [`LocalArena`] only takes the lock while the source grows, because the
/// source (typically the program break) is a single process-wide cursor.
///
/// Logging happens while the lock is held. When a `Heap` is the global
/// allocator, an installed logger must not allocate at `trace` level.
pub struct Heap<S> {
    placement: Placement,
    shared: Mutex<Shared<S>>,
}

struct Shared<S> {
    arena: Arena,
    source: S,
    /// Bytes ever obtained from `source`, by any arena.
    grown: usize,
}

impl<S: HeapSource> Shared<S> {
    fn grow(&mut self, len: usize) -> Option<NonNull<u8>> {
        let region = self.source.grow(len)?;
        self.grown += len;
        Some(region)
    }
}

/// Usable size for a request and the bytes needed to grow a fresh block for it.
fn sizes(requested: usize) -> Result<(usize, usize), AllocError> {
    let overflow = AllocError::SizeOverflow { requested };
    let usable = utils::request_size(requested).ok_or(overflow)?;
    let len = utils::grow_size(usable).ok_or(overflow)?;
    Ok((usable, len))
}

/// Turns a freshly grown region into an allocated block. Fresh blocks never
/// enter a free list.
fn fresh(
    region: Option<NonNull<u8>>,
    usable: usize,
    requested: usize,
) -> Result<NonNull<u8>, AllocError> {
    let Some(region) = region else {
        log::warn!("heap growth of {} bytes failed", HEADER_SIZE + usable);
        return Err(AllocError::OutOfMemory { requested });
    };

    let block = unsafe { Block::write(region, usable) };
    log::debug!("grew heap by {} bytes at {:p}", HEADER_SIZE + usable, block);
    Ok(Block::payload(block))
}

impl<S> Heap<S> {
    /// Creates an empty heap. Nothing is requested from `source` until the
    /// first allocation misses.
    pub const fn new(source: S, placement: Placement) -> Self {
        Self {
            placement,
            shared: Mutex::new(Shared {
                arena: Arena::new(),
                source,
                grown: 0,
            }),
        }
    }
}

impl<S: HeapSource> Heap<S> {
    /// Default placement of the shared arena, inherited by local ones.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Allocates at least `size` bytes from the shared arena.
    ///
    /// Requests are rounded up to the pointer size and a zero-byte request is
    /// served as a one-byte one.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.allocate_with(size, self.placement)
    }

    /// Same as [`Heap::allocate`] but searches the free list with `placement`
    /// instead of the heap's default. Blocks can be released with
    /// [`Heap::release`] whichever policy found them.
    pub fn allocate_with(
        &self,
        size: usize,
        placement: Placement,
    ) -> Result<NonNull<u8>, AllocError> {
        let (usable, len) = sizes(size)?;
        let mut shared = self.shared.lock();

        if let Some(block) = shared.arena.find(placement, usable) {
            return Ok(unsafe { shared.arena.reuse(block, usable) });
        }

        let region = shared.grow(len);
        fresh(region, usable, size)
    }

    /// Same as [`Heap::allocate`] but checks that `layout` needs no more than
    /// pointer alignment.
    pub fn allocate_layout(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.align() > WORD {
            return Err(AllocError::UnsupportedAlignment {
                align: layout.align(),
            });
        }

        self.allocate(layout.size())
    }

    /// Returns memory to the shared arena, merging it with adjacent free
    /// blocks.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Heap::allocate`] on this heap and must not have
    /// been released already.
    pub unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { self.shared.lock().arena.release(ptr) }
    }

    /// Creates a private arena for the calling thread.
    ///
    /// The arena is never torn down: whatever it holds when dropped stays
    /// claimed until the process exits.
    pub fn local(&self) -> LocalArena<'_, S> {
        LocalArena {
            heap: self,
            placement: self.placement,
            arena: Arena::new(),
            _thread: PhantomData,
        }
    }

    /// Allocates out of `arena`, taking the heap lock only to grow.
    pub(crate) fn allocate_local(
        &self,
        arena: &mut Arena,
        size: usize,
        placement: Placement,
    ) -> Result<NonNull<u8>, AllocError> {
        let (usable, len) = sizes(size)?;

        if let Some(block) = arena.find(placement, usable) {
            return Ok(unsafe { arena.reuse(block, usable) });
        }

        let region = self.shared.lock().grow(len);
        fresh(region, usable, size)
    }

    /// Snapshot of the shared arena's free list.
    pub fn stats(&self) -> FreeStats {
        self.shared.lock().arena.stats()
    }

    /// Sum of the usable size of every free block in the shared arena.
    pub fn total_free_bytes(&self) -> usize {
        self.stats().free_bytes
    }

    /// Usable size of the largest free block in the shared arena, 0 if none.
    pub fn largest_free_block(&self) -> usize {
        self.stats().largest_block
    }

    /// Calls `f` for every free block of the shared arena in address order.
    ///
    /// The heap stays locked for the whole walk, so `f` must not use this heap.
    pub fn for_each_free_block(&self, f: impl FnMut(FreeBlock)) {
        self.shared.lock().arena.free_blocks().for_each(f);
    }

    /// Total bytes obtained from the heap source so far, by every arena.
    pub fn grown_bytes(&self) -> usize {
        self.shared.lock().grown
    }
}

unsafe impl<S: HeapSource> GlobalAlloc for Heap<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.allocate_layout(layout) {
            Ok(ptr) => ptr.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.release(ptr) }
        }
    }
}

/// A heap arena private to one thread.
///
/// Searching, splitting and merging never lock. Growing borrows the parent
/// [`Heap`]'s lock for the duration of the [`HeapSource::grow`] call only.
///
/// Memory obtained here must be released here.
pub struct LocalArena<'h, S> {
    heap: &'h Heap<S>,
    placement: Placement,
    arena: Arena,
    // Bound to the creating thread.
    _thread: PhantomData<*mut ()>,
}

impl<S: HeapSource> LocalArena<'_, S> {
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Allocates at least `size` bytes from this arena.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.allocate_with(size, self.placement)
    }

    /// Allocates with an explicit placement policy.
    pub fn allocate_with(
        &mut self,
        size: usize,
        placement: Placement,
    ) -> Result<NonNull<u8>, AllocError> {
        self.heap.allocate_local(&mut self.arena, size, placement)
    }

    /// # Safety
    ///
    /// `ptr` must come from [`LocalArena::allocate`] on this arena and must not
    /// have been released already.
    pub unsafe fn release(&mut self, ptr: NonNull<u8>) {
        unsafe { self.arena.release(ptr) }
    }

    pub fn stats(&self) -> FreeStats {
        self.arena.stats()
    }

    pub fn for_each_free_block(&self, f: impl FnMut(FreeBlock)) {
        self.arena.free_blocks().for_each(f);
    }
}
