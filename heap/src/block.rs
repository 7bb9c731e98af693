//! Block header layout and size arithmetic.
//!
//! Every block starts with a [`BlockHeader`]; the payload handed to callers
//! follows it directly. Free blocks additionally keep their free-list links in
//! the first payload bytes, which is why no payload is ever smaller than
//! [`MIN_PAYLOAD`].

use core::mem::size_of;

use minlibc_lib::align_up_checked;

/// Payload alignment guaranteed by `malloc`.
pub const ALIGNMENT: usize = 16;
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();
/// Smallest payload a block may have: room for the free-list links.
pub const MIN_PAYLOAD: usize = 16;
pub const MIN_BLOCK_SIZE: usize = HEADER_SIZE + MIN_PAYLOAD;

/// Largest payload the heap will try to satisfy.
pub const MAX_REQUEST: usize = isize::MAX as usize - 4096;

pub const MAGIC_FREE: u32 = 0xF7EE_B10C;
pub const MAGIC_ALLOCATED: u32 = 0xA110_CA7E;
const CHECKSUM_SEED: u32 = 0x5EED_1BAD;

/// Link value meaning "no block".
pub const NIL: usize = usize::MAX;

pub const NUM_SIZE_CLASSES: usize = 16;
const MIN_CLASS_SHIFT: u32 = 4;

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(MIN_PAYLOAD >= size_of::<FreeLinks>());

#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub magic: u32,
    pub checksum: u32,
    /// Payload bytes, header excluded.
    pub size: usize,
    /// Total bytes (header + payload) of the physically preceding block, 0 for
    /// the first block in the arena.
    pub prev_size: usize,
}

impl BlockHeader {
    pub fn new(size: usize, prev_size: usize, magic: u32) -> Self {
        let mut header = Self {
            magic,
            checksum: 0,
            size,
            prev_size,
        };
        header.checksum = header.compute_checksum();
        header
    }

    fn compute_checksum(&self) -> u32 {
        fold(self.size) ^ fold(self.prev_size).rotate_left(11) ^ self.magic.rotate_left(7) ^ CHECKSUM_SEED
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        (self.magic == MAGIC_FREE || self.magic == MAGIC_ALLOCATED)
            && self.checksum == self.compute_checksum()
            && self.size >= MIN_PAYLOAD
            && self.size % ALIGNMENT == 0
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.magic == MAGIC_FREE
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.magic == MAGIC_ALLOCATED
    }

    /// Header plus payload.
    #[inline]
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.size
    }

    pub fn with_size(self, size: usize) -> Self {
        Self::new(size, self.prev_size, self.magic)
    }

    pub fn with_prev_size(self, prev_size: usize) -> Self {
        Self::new(self.size, prev_size, self.magic)
    }

    pub fn with_magic(self, magic: u32) -> Self {
        Self::new(self.size, self.prev_size, magic)
    }
}

#[inline]
fn fold(value: usize) -> u32 {
    let wide = value as u64;
    (wide ^ (wide >> 32)) as u32
}

/// Free-list links stored at the start of a free block's payload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeLinks {
    pub next: usize,
    pub prev: usize,
}

impl FreeLinks {
    pub const DETACHED: Self = Self {
        next: NIL,
        prev: NIL,
    };
}

/// Payload size a request of `size` bytes occupies.
pub fn payload_for_request(size: usize) -> Option<usize> {
    if size > MAX_REQUEST {
        return None;
    }
    align_up_checked(size.max(MIN_PAYLOAD), ALIGNMENT)
}

/// Free-list bucket for a payload size: `floor(log2(size)) - 4`, clamped.
pub fn size_class(size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    let log2 = usize::BITS - 1 - size.leading_zeros();
    let class = log2.saturating_sub(MIN_CLASS_SHIFT) as usize;
    class.min(NUM_SIZE_CLASSES - 1)
}
