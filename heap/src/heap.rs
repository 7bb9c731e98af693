//! Free-list heap over a single growable arena.
//!
//! Blocks tile the arena back to back. Each header records its own payload
//! size and the total size of the block before it, so both neighbours of a
//! block are reachable in O(1) and freeing coalesces in both directions. Free
//! blocks sit in segregated lists (see `free_list.rs`); allocation splits the
//! chosen block when the leftover is large enough to stand on its own.
//!
//! A `Heap` is a plain value with no hidden globals. Wrap it in `LockedHeap`
//! to share it between threads.

use core::ptr::NonNull;

use minlibc_abi::{AllocError, AllocResult, HeapStats};
use minlibc_lib::{align_down, align_up, mlog_debug, mlog_error, mlog_info, mlog_warn};

use crate::arena::Arena;
use crate::block::{
    payload_for_request, size_class, BlockHeader, ALIGNMENT, HEADER_SIZE, MAGIC_ALLOCATED,
    MAGIC_FREE, MIN_BLOCK_SIZE, NIL, NUM_SIZE_CLASSES,
};
use crate::config::{DebugFlags, HeapConfig, POISON_BYTE};
use crate::free_list::FreeLists;
use crate::source::MemorySource;

#[derive(Clone, Copy, Default)]
struct Counters {
    allocation_count: u32,
    free_count: u32,
    grow_count: u32,
    failed_count: u32,
}

pub struct Heap<S> {
    arena: Arena,
    source: S,
    /// One past the last byte the source has handed out; the next extent must
    /// start here.
    source_end: usize,
    free: FreeLists,
    /// Offset of the physically last block, `NIL` before initialisation.
    last: usize,
    config: HeapConfig,
    counters: Counters,
}

// SAFETY: the heap exclusively owns its arena; the raw base pointer is never
// shared outside a `&mut Heap` borrow.
unsafe impl<S: Send> Send for Heap<S> {}

impl<S> Heap<S> {
    /// Create a heap that obtains its arena from `source` on first use.
    pub const fn new(source: S, config: HeapConfig) -> Self {
        Self {
            arena: Arena::empty(),
            source,
            source_end: 0,
            free: FreeLists::new(),
            last: NIL,
            config,
            counters: Counters {
                allocation_count: 0,
                free_count: 0,
                grow_count: 0,
                failed_count: 0,
            },
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_initialized(&self) -> bool {
        !self.arena.is_empty()
    }

    /// Whether `ptr` points into the arena (not necessarily at a live block).
    pub fn owns(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        !self.arena.is_empty() && addr >= self.arena.base_addr() && addr < self.arena.end_addr()
    }
}

impl<S: MemorySource> Heap<S> {
    /// Obtain the initial arena. Called implicitly by every allocating entry
    /// point; calling it again is a no-op.
    pub fn init(&mut self) -> AllocResult<()> {
        if !self.arena.is_empty() {
            return Ok(());
        }

        let min = MIN_BLOCK_SIZE + ALIGNMENT;
        let preferred = self.config.initial_size.max(min);
        let Some(extent) = self.source.grow(min, preferred) else {
            mlog_warn!("heap: memory source refused initial arena of {} bytes", preferred);
            return Err(AllocError::OutOfMemory);
        };

        let start = extent.start.as_ptr() as usize;
        let skew = align_up(start, ALIGNMENT) - start;
        let usable = align_down(extent.len.saturating_sub(skew), ALIGNMENT);
        if usable < MIN_BLOCK_SIZE {
            mlog_warn!("heap: initial extent of {} bytes is too small", extent.len);
            return Err(AllocError::OutOfMemory);
        }
        let Some(base) = NonNull::new(extent.start.as_ptr().wrapping_add(skew)) else {
            return Err(AllocError::OutOfMemory);
        };

        self.arena.adopt(base, usable);
        self.source_end = start + extent.len;
        self.arena
            .set_header(0, BlockHeader::new(usable - HEADER_SIZE, 0, MAGIC_FREE));
        self.free.push_front(&mut self.arena, 0);
        self.last = 0;

        mlog_debug!("heap: arena of {} bytes at {:#x}", usable, self.arena.base_addr());
        Ok(())
    }

    pub fn malloc(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        let result = self.allocate_bytes(size);
        match result {
            Ok(off) => Ok(self.arena.payload(off)),
            Err(err) => Err(self.note_failure("malloc", size, err)),
        }
    }

    pub fn calloc(&mut self, count: usize, elem_size: usize) -> AllocResult<NonNull<u8>> {
        let Some(total) = count.checked_mul(elem_size) else {
            return Err(self.note_failure("calloc", usize::MAX, AllocError::Overflow));
        };
        let off = match self.allocate_bytes(total) {
            Ok(off) => off,
            Err(err) => return Err(self.note_failure("calloc", total, err)),
        };
        let capacity = self.arena.header(off).size;
        self.arena.fill_payload(off, 0, capacity, 0);
        Ok(self.arena.payload(off))
    }

    /// Resize an allocation.
    ///
    /// A null `ptr` allocates; `new_size == 0` frees and returns `Ok(None)`.
    /// On error the original allocation is left untouched.
    pub fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> AllocResult<Option<NonNull<u8>>> {
        if ptr.is_null() {
            return self.malloc(new_size).map(Some);
        }
        if new_size == 0 {
            self.free(ptr)?;
            return Ok(None);
        }
        match self.resize(ptr, new_size) {
            Ok(off) => Ok(Some(self.arena.payload(off))),
            Err(err) => Err(self.note_failure("realloc", new_size, err)),
        }
    }

    pub fn free(&mut self, ptr: *mut u8) -> AllocResult<()> {
        if ptr.is_null() {
            return Ok(());
        }
        let off = self.validate(ptr)?;

        if self.config.debug.contains(DebugFlags::POISON_FREED) {
            let size = self.arena.header(off).size;
            self.arena.fill_payload(off, 0, size, POISON_BYTE);
        }
        self.release(off);
        self.counters.free_count = self.counters.free_count.wrapping_add(1);

        if self.config.debug.contains(DebugFlags::VERIFY_ON_FREE) {
            self.check()?;
        }
        Ok(())
    }

    /// Allocate `size` bytes whose address is a multiple of `alignment`.
    ///
    /// The bytes in front of the aligned payload become a free block of their
    /// own, so the result carries an ordinary header and frees like any other
    /// allocation.
    pub fn aligned_alloc(&mut self, alignment: usize, size: usize) -> AllocResult<NonNull<u8>> {
        if !alignment.is_power_of_two() {
            return Err(self.note_failure("aligned_alloc", size, AllocError::InvalidAlignment));
        }
        if alignment <= ALIGNMENT {
            return self.malloc(size);
        }
        match self.allocate_aligned(alignment, size) {
            Ok(off) => Ok(self.arena.payload(off)),
            Err(err) => Err(self.note_failure("aligned_alloc", size, err)),
        }
    }

    fn allocate_bytes(&mut self, size: usize) -> AllocResult<usize> {
        let need = payload_for_request(size).ok_or(AllocError::OutOfMemory)?;
        self.init()?;
        let off = self.find_or_grow(need)?;
        self.free.remove(&mut self.arena, off);
        let header = self.arena.header(off).with_magic(MAGIC_ALLOCATED);
        self.arena.set_header(off, header);
        if let Some(rem) = self.split(off, need) {
            self.release(rem);
        }
        self.counters.allocation_count = self.counters.allocation_count.wrapping_add(1);
        Ok(off)
    }

    fn allocate_aligned(&mut self, alignment: usize, size: usize) -> AllocResult<usize> {
        let need = payload_for_request(size).ok_or(AllocError::OutOfMemory)?;
        let search = need
            .checked_add(alignment)
            .and_then(|n| n.checked_add(MIN_BLOCK_SIZE))
            .ok_or(AllocError::OutOfMemory)?;
        self.init()?;
        let mut off = self.find_or_grow(search)?;
        self.free.remove(&mut self.arena, off);

        let payload_addr = self.arena.base_addr() + off + HEADER_SIZE;
        let mut gap = align_up(payload_addr, alignment) - payload_addr;
        if gap != 0 && gap < MIN_BLOCK_SIZE {
            gap += alignment;
        }

        let header = self.arena.header(off);
        if gap == 0 {
            self.arena.set_header(off, header.with_magic(MAGIC_ALLOCATED));
        } else {
            let lead = off;
            off += gap;
            self.arena
                .set_header(lead, BlockHeader::new(gap - HEADER_SIZE, header.prev_size, MAGIC_FREE));
            self.arena
                .set_header(off, BlockHeader::new(header.size - gap, gap, MAGIC_ALLOCATED));
            self.fix_next_prev_size(off);
            if self.last == lead {
                self.last = off;
            }
            self.release(lead);
        }

        if let Some(rem) = self.split(off, need) {
            self.release(rem);
        }
        self.counters.allocation_count = self.counters.allocation_count.wrapping_add(1);
        Ok(off)
    }

    fn resize(&mut self, ptr: *mut u8, new_size: usize) -> AllocResult<usize> {
        let off = self.validate(ptr)?;
        let need = payload_for_request(new_size).ok_or(AllocError::OutOfMemory)?;
        let header = self.arena.header(off);

        if header.size >= need {
            if let Some(rem) = self.split(off, need) {
                self.release(rem);
            }
            return Ok(off);
        }

        if let Some(next) = self.next_of(off) {
            let next_header = self.arena.header(next);
            let combined = header.size + next_header.total_size();
            if next_header.is_free() && combined >= need {
                self.free.remove(&mut self.arena, next);
                self.arena.set_header(off, header.with_size(combined));
                if self.last == next {
                    self.last = off;
                }
                self.fix_next_prev_size(off);
                if let Some(rem) = self.split(off, need) {
                    self.release(rem);
                }
                return Ok(off);
            }
        }

        let new_off = self.allocate_bytes(new_size)?;
        self.arena
            .copy_payload(off, new_off, header.size.min(new_size));
        self.release(off);
        self.counters.free_count = self.counters.free_count.wrapping_add(1);
        Ok(new_off)
    }

    fn find_or_grow(&mut self, need: usize) -> AllocResult<usize> {
        if let Some(off) = self.free.find(&self.arena, need, self.config.fit) {
            return Ok(off);
        }
        self.grow(need)?;
        self.free
            .find(&self.arena, need, self.config.fit)
            .ok_or(AllocError::OutOfMemory)
    }

    /// Extend the arena so that a block with `need` payload bytes fits.
    fn grow(&mut self, need: usize) -> AllocResult<()> {
        let min = need
            .checked_add(HEADER_SIZE)
            .and_then(|n| minlibc_lib::align_up_checked(n, ALIGNMENT))
            .ok_or(AllocError::OutOfMemory)?;
        let preferred = min.max(self.config.grow_step);
        let Some(extent) = self.source.grow(min, preferred) else {
            return Err(AllocError::OutOfMemory);
        };
        if extent.start.as_ptr() as usize != self.source_end {
            mlog_warn!(
                "heap: ignoring non-contiguous extent at {:#x}, arena ends at {:#x}",
                extent.start.as_ptr() as usize,
                self.source_end
            );
            return Err(AllocError::OutOfMemory);
        }
        self.source_end += extent.len;

        let added = align_down(self.source_end - self.arena.end_addr(), ALIGNMENT);
        if added < MIN_BLOCK_SIZE {
            return Err(AllocError::OutOfMemory);
        }
        let old_len = self.arena.len();
        self.arena.extend(added);

        let last = self.last;
        let last_header = self.arena.header(last);
        if last_header.is_free() {
            self.free.remove(&mut self.arena, last);
            self.arena
                .set_header(last, last_header.with_size(last_header.size + added));
            self.free.push_front(&mut self.arena, last);
        } else {
            self.arena.set_header(
                old_len,
                BlockHeader::new(added - HEADER_SIZE, last_header.total_size(), MAGIC_FREE),
            );
            self.free.push_front(&mut self.arena, old_len);
            self.last = old_len;
        }

        self.counters.grow_count = self.counters.grow_count.wrapping_add(1);
        mlog_debug!("heap: grew arena by {} bytes to {}", added, self.arena.len());
        Ok(())
    }
}

impl<S> Heap<S> {
    /// Payload capacity of a live allocation.
    pub fn usable_size(&self, ptr: *const u8) -> AllocResult<usize> {
        let off = self.validate(ptr)?;
        Ok(self.arena.header(off).size)
    }

    fn note_failure(&mut self, op: &str, size: usize, err: AllocError) -> AllocError {
        self.counters.failed_count = self.counters.failed_count.wrapping_add(1);
        if !err.is_corruption() {
            mlog_debug!("heap: {}({}) failed: {}", op, size, err);
        }
        err
    }

    /// Resolve a caller pointer to the offset of a live allocated block.
    fn validate(&self, ptr: *const u8) -> AllocResult<usize> {
        let Some(off) = self.arena.block_of(ptr) else {
            mlog_error!("heap: pointer {:#x} is not a heap allocation", ptr as usize);
            return Err(AllocError::InvalidPointer);
        };
        let header = self.arena.header(off);
        if !header.is_valid()
            || header.prev_size > off
            || off + header.total_size() > self.arena.len()
        {
            mlog_error!("heap: corrupted block header for {:#x}", ptr as usize);
            return Err(AllocError::Corrupted);
        }
        if header.is_free() {
            mlog_error!("heap: double free of {:#x}", ptr as usize);
            return Err(AllocError::DoubleFree);
        }
        Ok(off)
    }

    #[inline]
    fn next_of(&self, off: usize) -> Option<usize> {
        let end = off + self.arena.header(off).total_size();
        (end < self.arena.len()).then_some(end)
    }

    #[inline]
    fn prev_of(&self, off: usize) -> Option<usize> {
        let prev_size = self.arena.header(off).prev_size;
        (prev_size != 0).then(|| off - prev_size)
    }

    fn fix_next_prev_size(&mut self, off: usize) {
        let total = self.arena.header(off).total_size();
        if let Some(next) = self.next_of(off) {
            let next_header = self.arena.header(next);
            self.arena.set_header(next, next_header.with_prev_size(total));
        }
    }

    /// Shrink the block at `off` to `need` payload bytes when the tail can
    /// stand as a block of its own. Returns the tail, which is on no list.
    fn split(&mut self, off: usize, need: usize) -> Option<usize> {
        let header = self.arena.header(off);
        let spare = header.size.checked_sub(need)?;
        let floor = HEADER_SIZE.checked_add(self.config.split_threshold())?;
        if spare < floor {
            return None;
        }
        self.arena.set_header(off, header.with_size(need));
        let rem = off + HEADER_SIZE + need;
        self.arena.set_header(
            rem,
            BlockHeader::new(spare - HEADER_SIZE, HEADER_SIZE + need, MAGIC_FREE),
        );
        self.fix_next_prev_size(rem);
        if self.last == off {
            self.last = rem;
        }
        Some(rem)
    }

    /// Mark a block that is on no list as free, merge it with free
    /// neighbours and list the result. Returns the merged block's offset.
    fn release(&mut self, off: usize) -> usize {
        let mut off = off;
        let mut header = self.arena.header(off).with_magic(MAGIC_FREE);
        self.arena.set_header(off, header);

        if let Some(next) = self.next_of(off) {
            let next_header = self.arena.header(next);
            if next_header.is_free() {
                self.free.remove(&mut self.arena, next);
                header = header.with_size(header.size + next_header.total_size());
                self.arena.set_header(off, header);
                if self.last == next {
                    self.last = off;
                }
            }
        }

        if let Some(prev) = self.prev_of(off) {
            let prev_header = self.arena.header(prev);
            if prev_header.is_free() {
                self.free.remove(&mut self.arena, prev);
                self.arena
                    .set_header(prev, prev_header.with_size(prev_header.size + header.total_size()));
                if self.last == off {
                    self.last = prev;
                }
                off = prev;
            }
        }

        self.fix_next_prev_size(off);
        self.free.push_front(&mut self.arena, off);
        off
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats::new();
        stats.allocation_count = self.counters.allocation_count;
        stats.free_count = self.counters.free_count;
        stats.grow_count = self.counters.grow_count;
        stats.failed_count = self.counters.failed_count;
        if self.arena.is_empty() {
            return stats;
        }

        stats.total_size = self.arena.len() as u64;
        let mut off = 0;
        while off < self.arena.len() {
            let header = self.arena.header(off);
            stats.total_blocks += 1;
            if header.is_free() {
                stats.free_blocks += 1;
                stats.free_size += header.size as u64;
                stats.largest_free_block = stats.largest_free_block.max(header.size as u64);
            } else {
                stats.allocated_blocks += 1;
                stats.allocated_size += header.size as u64;
            }
            off += header.total_size();
        }
        stats
    }

    /// Walk the whole heap and verify every structural invariant.
    pub fn check(&self) -> AllocResult<()> {
        if self.arena.is_empty() {
            return Ok(());
        }
        let len = self.arena.len();

        let mut off = 0;
        let mut prev_total = 0;
        let mut prev_free = false;
        let mut free_blocks = 0usize;
        let mut last = NIL;
        while off < len {
            if off + MIN_BLOCK_SIZE > len {
                return Err(corruption("truncated block", off));
            }
            let header = self.arena.header(off);
            if !header.is_valid() {
                return Err(corruption("invalid header", off));
            }
            if header.prev_size != prev_total {
                return Err(corruption("stale prev_size", off));
            }
            if header.is_free() {
                if prev_free {
                    return Err(corruption("uncoalesced free neighbours", off));
                }
                free_blocks += 1;
            }
            prev_free = header.is_free();
            prev_total = header.total_size();
            last = off;
            off = match off.checked_add(header.total_size()) {
                Some(next) => next,
                None => return Err(corruption("block size overflow", off)),
            };
        }
        if off != len {
            return Err(corruption("blocks overrun arena", off));
        }
        if last != self.last {
            return Err(corruption("last block mismatch", last));
        }

        let mut listed = 0usize;
        for class in 0..NUM_SIZE_CLASSES {
            let mut prev = NIL;
            let mut current = self.free.head(class);
            while current != NIL {
                if listed >= free_blocks {
                    return Err(corruption("free list longer than free block count", current));
                }
                let in_bounds = current
                    .checked_add(MIN_BLOCK_SIZE)
                    .is_some_and(|end| end <= len);
                if current % ALIGNMENT != 0 || !in_bounds {
                    return Err(corruption("free list link outside arena", current));
                }
                let header = self.arena.header(current);
                if !header.is_valid() || !header.is_free() {
                    return Err(corruption("allocated block on free list", current));
                }
                if size_class(header.size) != class {
                    return Err(corruption("free block in wrong size class", current));
                }
                let links = self.arena.links(current);
                if links.prev != prev {
                    return Err(corruption("broken back link", current));
                }
                listed += 1;
                prev = current;
                current = links.next;
            }
        }
        if listed != free_blocks {
            return Err(corruption("free block missing from free lists", 0));
        }
        Ok(())
    }

    pub fn print_stats(&self) {
        let stats = self.stats();
        mlog_info!("=== Heap Statistics ===");
        mlog_info!("Total size: {} bytes", stats.total_size);
        mlog_info!("Allocated: {} bytes in {} blocks", stats.allocated_size, stats.allocated_blocks);
        mlog_info!("Free: {} bytes in {} blocks", stats.free_size, stats.free_blocks);
        mlog_info!("Largest free block: {} bytes", stats.largest_free_block);
        mlog_info!("Header overhead: {} bytes", stats.overhead());
        mlog_info!(
            "Allocations: {}, frees: {}, growths: {}, failures: {}",
            stats.allocation_count,
            stats.free_count,
            stats.grow_count,
            stats.failed_count
        );
    }
}

fn corruption(what: &str, off: usize) -> AllocError {
    mlog_error!("heap: {} at offset {:#x}", what, off);
    AllocError::Corrupted
}
