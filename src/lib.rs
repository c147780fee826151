//! A free-list heap allocator with two placement policies and two ways of
//! sharing the heap between threads.
//!
//! Memory is obtained from a [`HeapSource`] (by default the program break)
//! and carved into blocks, each preceded by a small header:
//!
//! ```text
//! +-------------------------------+
//! | Header   | Actual memory block |
//! +-------------------------------+
//!            ^ pointer returned to the caller
//! ```
//!
//! Free blocks are kept in an address-ordered doubly linked list whose links
//! live inside the free blocks themselves. Allocation picks a block with
//! [`Placement::FirstFit`] or [`Placement::BestFit`] and splits off whatever
//! is left when it can hold a header and at least one word. Releasing merges
//! the block with its free neighbours, so the list never holds two adjacent
//! blocks. When nothing fits, the heap grows by exactly one block. Memory is
//! never handed back to the operating system.
//!
//! A [`Heap`] owns one shared arena guarded by a lock, and hands out
//! [`LocalArena`]s that need no lock except while growing. The [`global`]
//! module exposes both flavours over the process program break.
//!
//! ```no_run
//! use tsmalloc::{FixedHeap, Heap, Placement};
//!
//! let heap = Heap::new(FixedHeap::reserve(1 << 16)?, Placement::FirstFit);
//! let ptr = heap.allocate(128)?;
//! unsafe { heap.release(ptr) };
//! assert_eq!(heap.largest_free_block(), 128);
//! # Ok::<(), tsmalloc::AllocError>(())
//! ```

mod arena;
mod block;
mod error;
mod freelist;
pub mod global;
mod heap;
mod kernel;
mod list;
mod placement;
mod stats;
mod utils;

pub use block::HEADER_SIZE;
pub use error::AllocError;
pub use heap::{Heap, LocalArena};
pub use kernel::{FixedHeap, HeapSource, ProgramBreak};
pub use placement::Placement;
pub use stats::{FreeBlock, FreeStats};
pub use utils::WORD;
