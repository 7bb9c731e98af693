//! One-way atomic flag for "has this been set up yet" state.
//!
//! ```ignore
//! static CONFIG_LOCKED: InitFlag = InitFlag::new();
//!
//! if !CONFIG_LOCKED.init_once() {
//!     return false; // somebody else already froze the configuration
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

#[repr(transparent)]
pub struct InitFlag {
    flag: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Set the flag, returning `true` only for the call that flipped it.
    #[inline]
    pub fn init_once(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Acquire load, pairs with [`InitFlag::mark_set`].
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Relaxed load for fast-path guards that publish nothing.
    #[inline]
    pub fn is_set_relaxed(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mark_set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clear the flag. Only meaningful for state that can be torn down again,
    /// such as a detachable log sink.
    #[inline]
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}
