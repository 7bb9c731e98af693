//! C allocation entry points over one process-wide heap.
//!
//! The symbols carry their C names only with the `export-symbols` feature,
//! and never in this crate's own unit tests, so they do not replace the host
//! allocator by accident.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod abort;
pub mod malloc;
pub mod process_heap;

pub use abort::{abort, minlibc_set_abort_hook, AbortHook};
pub use malloc::{
    aligned_alloc, calloc, free, malloc, minlibc_heap_check, minlibc_heap_configure,
    minlibc_heap_print_stats, minlibc_heap_stats, minlibc_heap_use_sbrk, realloc, size_t,
};
pub use process_heap::{process_heap, Backing, SetupError, STATIC_ARENA_SIZE};
