//! The arena and every raw memory access the heap performs.
//!
//! Blocks are named by their byte offset from the arena base. All header and
//! link reads/writes go through the accessors below, which bounds-check the
//! offset against the committed length before touching memory, so the unsafe
//! surface of the allocator is this file plus `source.rs`.

use core::ptr::{self, NonNull};

use crate::block::{BlockHeader, FreeLinks, ALIGNMENT, HEADER_SIZE};

pub(crate) struct Arena {
    base: *mut u8,
    len: usize,
}

impl Arena {
    pub const fn empty() -> Self {
        Self {
            base: ptr::null_mut(),
            len: 0,
        }
    }

    /// Adopt `len` bytes at `base` as the arena.
    ///
    /// `base` must be `ALIGNMENT`-aligned and the bytes exclusively owned by
    /// the heap from now on; `MemorySource` implementations guarantee the
    /// latter.
    pub fn adopt(&mut self, base: NonNull<u8>, len: usize) {
        debug_assert!(self.base.is_null());
        debug_assert!(base.as_ptr() as usize % ALIGNMENT == 0);
        self.base = base.as_ptr();
        self.len = len;
    }

    /// Account for `by` more bytes contiguous with the current end.
    pub fn extend(&mut self, by: usize) {
        self.len += by;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.base.is_null()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn base_addr(&self) -> usize {
        self.base as usize
    }

    /// Address one past the last arena byte.
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.base as usize + self.len
    }

    #[inline]
    fn holds(&self, off: usize, bytes: usize) -> bool {
        !self.base.is_null()
            && off % ALIGNMENT == 0
            && off.checked_add(bytes).is_some_and(|end| end <= self.len)
    }

    #[inline]
    pub fn header(&self, off: usize) -> BlockHeader {
        assert!(self.holds(off, HEADER_SIZE), "header read outside arena");
        // SAFETY: bounds and alignment checked above; the arena owns the bytes.
        unsafe { self.base.add(off).cast::<BlockHeader>().read() }
    }

    #[inline]
    pub fn set_header(&mut self, off: usize, header: BlockHeader) {
        assert!(self.holds(off, HEADER_SIZE), "header write outside arena");
        // SAFETY: as in `header`.
        unsafe { self.base.add(off).cast::<BlockHeader>().write(header) }
    }

    #[inline]
    pub fn links(&self, off: usize) -> FreeLinks {
        let at = off + HEADER_SIZE;
        assert!(self.holds(at, core::mem::size_of::<FreeLinks>()), "link read outside arena");
        // SAFETY: links live in the payload of a block the arena owns; the
        // payload start is ALIGNMENT-aligned.
        unsafe { self.base.add(at).cast::<FreeLinks>().read() }
    }

    #[inline]
    pub fn set_links(&mut self, off: usize, links: FreeLinks) {
        let at = off + HEADER_SIZE;
        assert!(self.holds(at, core::mem::size_of::<FreeLinks>()), "link write outside arena");
        // SAFETY: as in `links`.
        unsafe { self.base.add(at).cast::<FreeLinks>().write(links) }
    }

    /// Caller-visible pointer for the block at `off`.
    #[inline]
    pub fn payload(&self, off: usize) -> NonNull<u8> {
        debug_assert!(self.holds(off, HEADER_SIZE));
        // SAFETY: the payload address is inside the arena, which is non-null.
        unsafe { NonNull::new_unchecked(self.base.add(off + HEADER_SIZE)) }
    }

    /// Header offset for a caller pointer, if the pointer can be a payload
    /// start at all. Header contents are not inspected.
    pub fn block_of(&self, ptr: *const u8) -> Option<usize> {
        if self.base.is_null() {
            return None;
        }
        let addr = ptr as usize;
        let payload_off = addr.checked_sub(self.base as usize)?;
        let off = payload_off.checked_sub(HEADER_SIZE)?;
        self.holds(off, HEADER_SIZE).then_some(off)
    }

    /// Fill `len` payload bytes of the block at `off`, starting `from` bytes in.
    pub fn fill_payload(&mut self, off: usize, from: usize, len: usize, byte: u8) {
        let at = off + HEADER_SIZE + from;
        assert!(at.checked_add(len).is_some_and(|end| end <= self.len), "fill outside arena");
        // SAFETY: range checked above.
        unsafe { ptr::write_bytes(self.base.add(at), byte, len) }
    }

    /// Copy `len` payload bytes from block `src` to block `dst`.
    pub fn copy_payload(&mut self, src: usize, dst: usize, len: usize) {
        let from = src + HEADER_SIZE;
        let to = dst + HEADER_SIZE;
        assert!(
            from.checked_add(len).is_some_and(|end| end <= self.len)
                && to.checked_add(len).is_some_and(|end| end <= self.len),
            "copy outside arena"
        );
        // SAFETY: both ranges checked above; `copy` tolerates overlap.
        unsafe { ptr::copy(self.base.add(from), self.base.add(to), len) }
    }
}
