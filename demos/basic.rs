use std::ptr::NonNull;

use tsmalloc::{AllocError, FixedHeap, Heap, Placement};

fn log_alloc(addr: NonNull<u8>, size: usize) {
    println!("Requested {} bytes of memory", size);
    println!("Received this address: {addr:?}");
}

fn main() -> Result<(), AllocError> {
    let heap = Heap::new(FixedHeap::reserve(1 << 16)?, Placement::BestFit);

    let addr1 = heap.allocate(8)?;
    log_alloc(addr1, 8);

    let addr2 = heap.allocate(64)?;
    log_alloc(addr2, 64);

    let addr3 = heap.allocate(16)?;
    log_alloc(addr3, 16);

    unsafe {
        heap.release(addr1);
        heap.release(addr2);
    }
    println!(
        "Free: {} bytes, largest block: {} bytes",
        heap.total_free_bytes(),
        heap.largest_free_block()
    );

    // The merged hole left by the first two blocks is reused.
    let addr4 = heap.allocate(48)?;
    println!("Reused first block: {}", addr4 == addr1);

    unsafe {
        heap.release(addr3);
        heap.release(addr4);
    }

    Ok(())
}
