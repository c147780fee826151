//! This example uses a [`Heap`] over the program break as the global
//! allocator, and then gives each worker thread its own lock-free arena. The
//! `tsmalloc::global` entry points grow the same break and can be mixed in.

use std::thread;

use tsmalloc::{Heap, Placement, ProgramBreak};

#[global_allocator]
static ALLOCATOR: Heap<ProgramBreak> = Heap::new(ProgramBreak::new(), Placement::FirstFit);

fn main() {
    // Box example
    let val_box = Box::new(22);
    println!("Box Value: {}, At: {:p}", val_box, val_box);

    // Vec example
    let mut v = Vec::new();
    for i in 0..5 {
        v.push(i * 10);
        println!("Added {}; Capacity: {}; At: {:p}", v[i], v.capacity(), v.as_ptr());
    }

    // Merge example
    let a = Box::new([0u8; 64]);
    let b = Box::new([0u8; 64]);
    let ptr_a = a.as_ptr();

    drop(a);
    drop(b);

    let c = Box::new([0u8; 128]);
    let ptr_c = c.as_ptr();

    if ptr_a == ptr_c {
        println!("Correctly reused at {:p}", ptr_c);
    } else {
        println!("Not reused. A was at {:p} and C is at {:p}", ptr_a, ptr_c);
    }
    println!(
        "Global heap: {} bytes free, largest block {}",
        ALLOCATOR.total_free_bytes(),
        ALLOCATOR.largest_free_block()
    );

    // Per-thread arenas, no locking outside heap growth.
    let workers: Vec<_> = (0..2)
        .map(|i| {
            thread::spawn(move || {
                let mut arena = ALLOCATOR.local();
                let ptr = arena.allocate(256).expect("program break exhausted");
                unsafe {
                    ptr.as_ptr().write_bytes(i, 256);
                    arena.release(ptr);
                }
                println!("Worker {} reused {:p}: {}", i, ptr, arena.allocate(256).ok() == Some(ptr));
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let raw = tsmalloc::global::first_fit::malloc_locked(64);
    println!("Process heap block at {:p}", raw);
    unsafe { tsmalloc::global::first_fit::free_locked(raw) };
}
