//! Thread-safe wrapper around [`Heap`].
//!
//! Every operation takes the lock for its whole duration, so each one is
//! atomic with respect to the others.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

use minlibc_abi::{AllocResult, HeapStats};
use spin::Mutex;

use crate::block::ALIGNMENT;
use crate::config::HeapConfig;
use crate::heap::Heap;
use crate::source::MemorySource;

pub struct LockedHeap<S> {
    inner: Mutex<Heap<S>>,
}

impl<S> LockedHeap<S> {
    pub const fn new(source: S, config: HeapConfig) -> Self {
        Self {
            inner: Mutex::new(Heap::new(source, config)),
        }
    }

    pub fn config(&self) -> HeapConfig {
        *self.inner.lock().config()
    }

    /// Run `f` with the heap locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut Heap<S>) -> R) -> R {
        let mut heap = self.inner.lock();
        f(&mut heap)
    }

    pub fn usable_size(&self, ptr: *const u8) -> AllocResult<usize> {
        self.inner.lock().usable_size(ptr)
    }

    pub fn stats(&self) -> HeapStats {
        self.inner.lock().stats()
    }

    pub fn check(&self) -> AllocResult<()> {
        self.inner.lock().check()
    }

    pub fn print_stats(&self) {
        self.inner.lock().print_stats();
    }
}

impl<S: MemorySource> LockedHeap<S> {
    pub fn malloc(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.inner.lock().malloc(size)
    }

    pub fn calloc(&self, count: usize, elem_size: usize) -> AllocResult<NonNull<u8>> {
        self.inner.lock().calloc(count, elem_size)
    }

    pub fn realloc(&self, ptr: *mut u8, new_size: usize) -> AllocResult<Option<NonNull<u8>>> {
        self.inner.lock().realloc(ptr, new_size)
    }

    pub fn free(&self, ptr: *mut u8) -> AllocResult<()> {
        self.inner.lock().free(ptr)
    }

    pub fn aligned_alloc(&self, alignment: usize, size: usize) -> AllocResult<NonNull<u8>> {
        self.inner.lock().aligned_alloc(alignment, size)
    }
}

unsafe impl<S: MemorySource + Send> GlobalAlloc for LockedHeap<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let result = if layout.align() <= ALIGNMENT {
            self.malloc(layout.size())
        } else {
            self.aligned_alloc(layout.align(), layout.size())
        };
        result.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= ALIGNMENT {
            return self
                .calloc(1, layout.size())
                .map_or(ptr::null_mut(), NonNull::as_ptr);
        }
        // SAFETY: forwarded caller contract.
        let ptr = unsafe { self.alloc(layout) };
        if !ptr.is_null() {
            // SAFETY: `alloc` returned at least `layout.size()` writable bytes.
            unsafe { ptr::write_bytes(ptr, 0, layout.size()) };
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // Bad pointers are logged by the heap; there is no way to report them
        // through this interface.
        let _ = self.free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() <= ALIGNMENT {
            return match self.inner.lock().realloc(ptr, new_size) {
                Ok(Some(new)) => new.as_ptr(),
                _ => ptr::null_mut(),
            };
        }
        let Ok(new_layout) = Layout::from_size_align(new_size, layout.align()) else {
            return ptr::null_mut();
        };
        // SAFETY: forwarded caller contract.
        let new = unsafe { self.alloc(new_layout) };
        if !new.is_null() {
            // SAFETY: both blocks are live and hold at least the copied length.
            unsafe {
                ptr::copy_nonoverlapping(ptr, new, layout.size().min(new_size));
                self.dealloc(ptr, layout);
            }
        }
        new
    }
}
