//! Raw memory providers for the arena.
//!
//! The heap asks its source for memory only when the arena is created and
//! when no free block can satisfy a request. After the first extent, every
//! extent must start exactly where the previous one ended, the way `brk`
//! grows a data segment.

use core::ffi::c_void;
use core::ptr::NonNull;

/// Bytes handed to the heap by a [`MemorySource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub start: NonNull<u8>,
    pub len: usize,
}

pub trait MemorySource {
    /// Provide at least `min_bytes`, ideally `preferred` bytes.
    ///
    /// Returns `None` when the source is exhausted. Memory handed out is
    /// owned by the heap for the rest of the program.
    fn grow(&mut self, min_bytes: usize, preferred: usize) -> Option<Extent>;
}

/// A fixed window of memory, committed to the heap piece by piece.
///
/// Models a statically reserved arena: growth succeeds until the window is
/// used up and fails afterwards.
#[derive(Debug)]
pub struct Region {
    base: NonNull<u8>,
    capacity: usize,
    committed: usize,
}

// SAFETY: Region is the sole owner of the window it was built from (see
// `Region::new`); moving it between threads moves that ownership.
unsafe impl Send for Region {}

impl Region {
    /// # Safety
    ///
    /// `base..base + capacity` must be valid for reads and writes, must not be
    /// used by anything else for as long as the heap built on this region
    /// lives, and must stay mapped until then.
    pub const unsafe fn new(base: NonNull<u8>, capacity: usize) -> Self {
        Self {
            base,
            capacity,
            committed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.committed
    }
}

impl MemorySource for Region {
    fn grow(&mut self, min_bytes: usize, preferred: usize) -> Option<Extent> {
        let remaining = self.remaining();
        if min_bytes > remaining {
            return None;
        }
        let len = preferred.max(min_bytes).min(remaining);
        // SAFETY: committed <= capacity, so the offset stays inside the window.
        let start = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.committed)) };
        self.committed += len;
        Some(Extent { start, len })
    }
}

/// `sbrk`-style break adjuster: returns the previous break, or `(void*)-1`
/// on failure.
pub type SbrkFn = unsafe extern "C" fn(increment: isize) -> *mut c_void;

/// Grows the arena by moving the program break.
#[derive(Clone, Copy, Debug)]
pub struct SbrkSource {
    sbrk: SbrkFn,
}

impl SbrkSource {
    /// # Safety
    ///
    /// `sbrk` must behave like POSIX `sbrk`: contiguous growth, previous break
    /// returned on success, and no other user of the break while the heap
    /// lives.
    pub const unsafe fn new(sbrk: SbrkFn) -> Self {
        Self { sbrk }
    }

    fn try_extend(&mut self, len: usize) -> Option<Extent> {
        let increment = isize::try_from(len).ok()?;
        // SAFETY: guaranteed by the contract of `SbrkSource::new`.
        let previous = unsafe { (self.sbrk)(increment) };
        if previous as isize == -1 {
            return None;
        }
        let start = NonNull::new(previous.cast::<u8>())?;
        Some(Extent { start, len })
    }
}

impl MemorySource for SbrkSource {
    fn grow(&mut self, min_bytes: usize, preferred: usize) -> Option<Extent> {
        if preferred > min_bytes {
            if let Some(extent) = self.try_extend(preferred) {
                return Some(extent);
            }
        }
        self.try_extend(min_bytes)
    }
}
