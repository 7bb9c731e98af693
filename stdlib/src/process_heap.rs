//! The process-wide heap behind the C allocation functions.
//!
//! Created on first use. Until then, `configure` and `use_sbrk` may change
//! how it is built; the first allocation freezes the choice.

use core::ptr::NonNull;

use minlibc_heap::{
    apply_cmdline, Extent, HeapConfig, LockedHeap, MemorySource, Region, SbrkFn, SbrkSource,
};
use minlibc_lib::{mlog_debug, mlog_set_level, mlog_warn, InitFlag};
use spin::{Mutex, Once};

pub const STATIC_ARENA_SIZE: usize = 1024 * 1024;

#[repr(C, align(16))]
struct StaticArena([u8; STATIC_ARENA_SIZE]);

static mut STATIC_ARENA: StaticArena = StaticArena([0; STATIC_ARENA_SIZE]);

/// Where the process heap gets its memory.
pub enum Backing {
    Static(Region),
    Sbrk(SbrkSource),
}

impl MemorySource for Backing {
    fn grow(&mut self, min_bytes: usize, preferred: usize) -> Option<Extent> {
        match self {
            Backing::Static(region) => region.grow(min_bytes, preferred),
            Backing::Sbrk(source) => source.grow(min_bytes, preferred),
        }
    }
}

struct PendingSetup {
    config: HeapConfig,
    sbrk: Option<SbrkFn>,
}

static PENDING: Mutex<PendingSetup> = Mutex::new(PendingSetup {
    config: HeapConfig::DEFAULT,
    sbrk: None,
});
static SETUP_FROZEN: InitFlag = InitFlag::new();
static PROCESS_HEAP: Once<LockedHeap<Backing>> = Once::new();

/// Why a setup call was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupError {
    /// The heap has already been created.
    AlreadyInitialized,
}

pub fn process_heap() -> &'static LockedHeap<Backing> {
    PROCESS_HEAP.call_once(|| {
        let pending = PENDING.lock();
        SETUP_FROZEN.mark_set();
        if let Some(level) = pending.config.log_level {
            mlog_set_level(level);
        }
        let backing = match pending.sbrk {
            // SAFETY: the caller of `use_sbrk` vouched for the break function.
            Some(sbrk) => Backing::Sbrk(unsafe { SbrkSource::new(sbrk) }),
            None => Backing::Static(static_region()),
        };
        mlog_debug!(
            "process heap: {} backing",
            if pending.sbrk.is_some() { "sbrk" } else { "static" }
        );
        LockedHeap::new(backing, pending.config)
    })
}

fn static_region() -> Region {
    let base = (&raw mut STATIC_ARENA).cast::<u8>();
    // SAFETY: runs once, inside `PROCESS_HEAP.call_once`; nothing else
    // touches STATIC_ARENA, so the region owns it for the program's lifetime.
    unsafe { Region::new(NonNull::new_unchecked(base), STATIC_ARENA_SIZE) }
}

pub fn is_initialized() -> bool {
    SETUP_FROZEN.is_set()
}

/// Apply `heap.*` tokens to the configuration the heap will be built with.
pub fn configure(cmdline: &str) -> Result<(), SetupError> {
    let mut pending = PENDING.lock();
    if SETUP_FROZEN.is_set() {
        mlog_warn!("process heap: configuration ignored, heap already in use");
        return Err(SetupError::AlreadyInitialized);
    }
    apply_cmdline(&mut pending.config, cmdline);
    Ok(())
}

/// Back the heap with a program break instead of the static arena.
///
/// # Safety
///
/// `sbrk` must satisfy the contract of [`SbrkSource::new`].
pub unsafe fn use_sbrk(sbrk: SbrkFn) -> Result<(), SetupError> {
    let mut pending = PENDING.lock();
    if SETUP_FROZEN.is_set() {
        mlog_warn!("process heap: sbrk backing ignored, heap already in use");
        return Err(SetupError::AlreadyInitialized);
    }
    pending.sbrk = Some(sbrk);
    Ok(())
}
