//! Explicit free-list heap allocator.
//!
//! [`Heap`] manages one contiguous arena obtained from a [`MemorySource`],
//! [`LockedHeap`] makes it shareable and usable as a `GlobalAlloc`.

#![no_std]

#[cfg(test)]
extern crate std;

mod arena;
pub mod block;
pub mod config;
mod free_list;
pub mod heap;
pub mod locked;
pub mod source;

pub use block::{ALIGNMENT, HEADER_SIZE, MAX_REQUEST, MIN_BLOCK_SIZE, MIN_PAYLOAD};
pub use config::{
    apply_cmdline, config_from_cmdline, DebugFlags, FitPolicy, HeapConfig,
    HEAP_DEFAULT_GROW_STEP, HEAP_DEFAULT_INITIAL_SIZE, POISON_BYTE,
};
pub use heap::Heap;
pub use locked::LockedHeap;
pub use minlibc_abi::{AllocError, AllocResult, HeapStats};
pub use source::{Extent, MemorySource, Region, SbrkFn, SbrkSource};
