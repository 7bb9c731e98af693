//! minlibc ABI Types
//!
//! Canonical definitions for the types that cross the C boundary of the
//! allocator: error codes handed back to C callers and the heap statistics
//! block filled in by `minlibc_heap_stats`.
//!
//! All types in this crate are `#[repr(C)]` (or `#[repr(i32)]`) for ABI stability.

#![no_std]
#![forbid(unsafe_code)]

pub mod error;
pub mod heap;

pub use error::*;
pub use heap::*;
