/// Reasons an allocation request can fail.
///
/// Only requests fail. Releasing memory has no error path: handing back a
/// pointer that did not come from the same arena is undefined behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("out of memory: the heap could not grow to hold {requested} bytes")]
    OutOfMemory { requested: usize },
    #[error("allocation of {requested} bytes overflows the address space")]
    SizeOverflow { requested: usize },
    #[error("alignment of {align} bytes exceeds pointer alignment")]
    UnsupportedAlignment { align: usize },
}
