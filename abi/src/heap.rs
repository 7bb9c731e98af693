//! Heap statistics shared with C callers.

/// Snapshot of the heap layout plus running counters.
///
/// Layout fields (`total_size` through `largest_free_block`) are computed by
/// walking the arena; counters accumulate since the heap was created.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena bytes, headers included.
    pub total_size: u64,
    /// Payload capacity of allocated blocks.
    pub allocated_size: u64,
    /// Payload capacity of free blocks.
    pub free_size: u64,
    /// Largest free payload, 0 when no block is free.
    pub largest_free_block: u64,
    pub total_blocks: u32,
    pub allocated_blocks: u32,
    pub free_blocks: u32,
    pub allocation_count: u32,
    pub free_count: u32,
    pub grow_count: u32,
    pub failed_count: u32,
}

impl HeapStats {
    pub const fn new() -> Self {
        Self {
            total_size: 0,
            allocated_size: 0,
            free_size: 0,
            largest_free_block: 0,
            total_blocks: 0,
            allocated_blocks: 0,
            free_blocks: 0,
            allocation_count: 0,
            free_count: 0,
            grow_count: 0,
            failed_count: 0,
        }
    }

    /// Bytes spent on block headers.
    #[inline]
    pub fn overhead(&self) -> u64 {
        self.total_size
            .saturating_sub(self.allocated_size)
            .saturating_sub(self.free_size)
    }
}
