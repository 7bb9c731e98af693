//! Power-of-two alignment helpers for `usize` addresses and sizes.
//!
//! `align` must be a non-zero power of two for every helper here; callers
//! validate user supplied alignments before reaching these.

/// Align `value` up to the nearest multiple of `align`. Wraps on overflow,
/// use [`align_up_checked`] for untrusted sizes.
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Align `value` down to the nearest multiple of `align`.
#[inline(always)]
pub const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

/// Align `value` up, returning `None` instead of wrapping past `usize::MAX`.
#[inline(always)]
pub const fn align_up_checked(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

#[inline(always)]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}
