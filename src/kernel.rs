//! Where heap memory comes from.
//!
//! The allocator itself never talks to the operating system directly. It asks
//! a [`HeapSource`] for more address space whenever no free block fits, and it
//! never gives memory back.

use std::ptr::NonNull;

use crate::{
    error::AllocError,
    utils::{self, WORD},
};

/// Something the heap can grow into.
///
/// # Safety
///
/// Every region returned by [`HeapSource::grow`] must be pointer-aligned,
/// readable and writable for `len` bytes, and not used by anything else for
/// the rest of the process.
pub unsafe trait HeapSource {
    /// Extends the heap by `len` bytes, returning the start of the new region,
    /// or `None` when no more address space is available.
    fn grow(&mut self, len: usize) -> Option<NonNull<u8>>;
}

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. As the allocator, our top level view of this, has nothing
/// to do with the concrete implementations / APIs offered by each kernel.
trait PlatformMemory {
    /// Request a readable and writable memory region of size `len`. It returns
    /// a pointer to the given location or None if the underlying syscall fails.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the virtual memory page size of the computer in bytes.
    fn page_size() -> usize;
}

pub(crate) struct Kernel;

/// The process-wide program break.
///
/// On Unix this is `sbrk`. On Windows, which has no program break, a large
/// window of address space is reserved on first use and committed page by
/// page as the break advances.
///
/// Any number of `ProgramBreak` values may coexist, in any number of heaps.
/// On Unix they all move the same break, so growth goes through one
/// process-wide lock. On Windows every value reserves its own window.
pub struct ProgramBreak {
    #[cfg(windows)]
    window: windows::Window,
}

impl ProgramBreak {
    pub const fn new() -> Self {
        Self {
            #[cfg(windows)]
            window: windows::Window::new(),
        }
    }
}

impl Default for ProgramBreak {
    fn default() -> Self {
        Self::new()
    }
}

/// A bump cursor over one contiguous region.
///
/// Useful when the heap must live inside a fixed span, and handy in tests
/// since exhaustion is deterministic.
pub struct FixedHeap {
    cursor: usize,
    end: usize,
}

impl FixedHeap {
    /// Serves growth out of `[base, base + len)`.
    ///
    /// # Safety
    ///
    /// The span must be valid for reads and writes, pointer-aligned, and used
    /// by nothing else for as long as any memory handed out from it is alive.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        let cursor = base.as_ptr() as usize;
        Self {
            cursor,
            end: cursor + len,
        }
    }

    /// Maps a fresh region of at least `len` bytes (rounded up to whole pages)
    /// straight from the operating system.
    pub fn reserve(len: usize) -> Result<Self, AllocError> {
        let overflow = AllocError::SizeOverflow { requested: len };
        let len = utils::align(len.max(1), Kernel::page_size()).ok_or(overflow)?;

        let base = unsafe { Kernel::request_memory(len) }
            .ok_or(AllocError::OutOfMemory { requested: len })?;
        log::debug!("reserved fixed heap of {} bytes at {:p}", len, base);

        Ok(unsafe { Self::new(base, len) })
    }

    /// Bytes still available for growth.
    pub fn remaining(&self) -> usize {
        self.end - self.cursor
    }
}

unsafe impl HeapSource for FixedHeap {
    fn grow(&mut self, len: usize) -> Option<NonNull<u8>> {
        if len > self.remaining() || len % WORD != 0 {
            return None;
        }

        let start = self.cursor;
        self.cursor += len;
        NonNull::new(start as *mut u8)
    }
}

#[cfg(unix)]
mod unix {
    use super::{HeapSource, Kernel, PlatformMemory, ProgramBreak};
    use crate::utils::WORD;

    use libc::{c_int, c_void, intptr_t, mmap, off_t, sbrk, size_t};
    use spin::Mutex;

    use std::ptr::NonNull;

    /// Held across both `sbrk` calls of a growth, whichever heap asks.
    static BREAK: Mutex<()> = Mutex::new(());

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                match mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) {
                    libc::MAP_FAILED => None,
                    addr => NonNull::new(addr.cast::<u8>()),
                }
            }
        }

        fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }

    /// `sbrk` signals failure with `(void*)-1`.
    fn failed(addr: *mut c_void) -> bool {
        addr == usize::MAX as *mut c_void
    }

    unsafe impl HeapSource for ProgramBreak {
        fn grow(&mut self, len: usize) -> Option<NonNull<u8>> {
            let _break = BREAK.lock();

            unsafe {
                // Somebody else may have left the break misaligned, so pad up
                // to the next word before carving our region.
                let current = sbrk(0);
                if failed(current) {
                    return None;
                }
                let misalign = current as usize % WORD;
                let pad = if misalign == 0 { 0 } else { WORD - misalign };

                let increment = intptr_t::try_from(len.checked_add(pad)?).ok()?;
                let addr = sbrk(increment);
                if failed(addr) {
                    return None;
                }

                let start = addr as usize + pad;
                // Only a foreign `sbrk` user (e.g. the libc allocator) can move
                // the break between the two calls. The span is leaked.
                if start % WORD != 0 {
                    return None;
                }

                NonNull::new(start as *mut u8)
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{ffi::c_void, mem::MaybeUninit, ptr::NonNull};

    use super::{HeapSource, Kernel, PlatformMemory, ProgramBreak};
    use crate::utils;

    use windows::Win32::System::{Memory, SystemInformation};

    /// Address space reserved for the emulated program break.
    #[cfg(target_pointer_width = "64")]
    const WINDOW_SIZE: usize = 1 << 36;
    #[cfg(not(target_pointer_width = "64"))]
    const WINDOW_SIZE: usize = 1 << 30;

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }

    /// Reserved range plus the current break and commit watermark.
    pub(super) struct Window {
        base: usize,
        brk: usize,
        committed: usize,
    }

    impl Window {
        pub(super) const fn new() -> Self {
            Self {
                base: 0,
                brk: 0,
                committed: 0,
            }
        }

        fn reserve(&mut self) -> Option<()> {
            if self.base != 0 {
                return Some(());
            }

            let addr = unsafe {
                Memory::VirtualAlloc(None, WINDOW_SIZE, Memory::MEM_RESERVE, Memory::PAGE_NOACCESS)
            };
            let base = NonNull::new(addr.cast::<u8>())?.as_ptr() as usize;

            self.base = base;
            self.brk = base;
            self.committed = base;
            Some(())
        }
    }

    unsafe impl HeapSource for ProgramBreak {
        fn grow(&mut self, len: usize) -> Option<NonNull<u8>> {
            let window = &mut self.window;
            window.reserve()?;

            let start = window.brk;
            let new_brk = start.checked_add(len)?;
            if new_brk > window.base + WINDOW_SIZE {
                return None;
            }

            if new_brk > window.committed {
                let commit = utils::align(new_brk - window.committed, Kernel::page_size())?;
                let addr = unsafe {
                    Memory::VirtualAlloc(
                        Some(window.committed as *const c_void),
                        commit,
                        Memory::MEM_COMMIT,
                        Memory::PAGE_READWRITE,
                    )
                };
                if addr.is_null() {
                    return None;
                }
                window.committed += commit;
            }

            window.brk = new_brk;
            NonNull::new(start as *mut u8)
        }
    }
}
