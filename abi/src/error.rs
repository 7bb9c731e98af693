//! Error types returned by the allocator

use core::ffi::c_int;
use core::fmt;

/// Implement common methods for allocator error enums.
///
/// Generates `as_c_int()`, `from_c_int()` and `as_str()` for `#[repr(i32)]`
/// error enums. `from_c_int()` maps `0` and unknown codes to `None`.
macro_rules! impl_alloc_error {
    ($ty:ty, variants: { $($val:literal => $variant:ident : $text:literal),* $(,)? }) => {
        impl $ty {
            /// Convert to C-style integer.
            #[inline]
            pub fn as_c_int(self) -> c_int {
                self as c_int
            }

            /// Convert from C-style integer.
            #[inline]
            pub fn from_c_int(val: c_int) -> Option<Self> {
                match val {
                    $($val => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Short human readable description.
            #[inline]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Allocator operation result type
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors returned by heap operations
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free block is large enough and the arena cannot grow
    OutOfMemory = -1,
    /// Size computation overflowed (`calloc` product or request rounding)
    Overflow = -2,
    /// Alignment is not a power of two
    InvalidAlignment = -3,
    /// Pointer does not designate a block payload inside the arena
    InvalidPointer = -4,
    /// Block is already free
    DoubleFree = -5,
    /// Block header or heap structure failed validation
    Corrupted = -6,
}

impl_alloc_error!(AllocError, variants: {
    -1 => OutOfMemory: "out of memory",
    -2 => Overflow: "size overflow",
    -3 => InvalidAlignment: "alignment is not a power of two",
    -4 => InvalidPointer: "pointer not owned by the heap",
    -5 => DoubleFree: "double free",
    -6 => Corrupted: "heap corruption detected",
});

impl AllocError {
    /// Errors that mean the caller handed back a bad pointer or the heap
    /// metadata is damaged. Continuing after one of these is unsafe.
    #[inline]
    pub fn is_corruption(self) -> bool {
        matches!(
            self,
            Self::InvalidPointer | Self::DoubleFree | Self::Corrupted
        )
    }
}
