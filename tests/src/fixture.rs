//! Heaps built over shared static windows, one test at a time.

use core::ffi::c_void;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use minlibc_heap::{Heap, HeapConfig, Region, SbrkSource};
use minlibc_lib::testing::TestFixture;
use spin::{Mutex, MutexGuard};

pub const FIXTURE_ARENA_SIZE: usize = 256 * 1024;
pub const FIXTURE_INITIAL_SIZE: usize = 16 * 1024;
pub const FIXTURE_GROW_STEP: usize = 16 * 1024;

#[repr(C, align(16))]
struct FixtureArena([u8; FIXTURE_ARENA_SIZE]);

static mut FIXTURE_ARENA: FixtureArena = FixtureArena([0; FIXTURE_ARENA_SIZE]);
static FIXTURE_LOCK: Mutex<()> = Mutex::new(());

pub fn fixture_config() -> HeapConfig {
    HeapConfig::DEFAULT
        .with_initial_size(FIXTURE_INITIAL_SIZE)
        .with_grow_step(FIXTURE_GROW_STEP)
}

/// A fresh heap over the fixture arena. Holds the arena lock until dropped.
pub struct HeapFixture {
    pub heap: Heap<Region>,
    _guard: MutexGuard<'static, ()>,
}

impl HeapFixture {
    pub fn with_config(config: HeapConfig) -> Self {
        let guard = FIXTURE_LOCK.lock();
        let base = (&raw mut FIXTURE_ARENA).cast::<u8>();
        // SAFETY: the lock gives this fixture sole use of the arena; the heap
        // is dropped before the guard releases it.
        let region = unsafe {
            base.write_bytes(0xA5, FIXTURE_ARENA_SIZE);
            Region::new(NonNull::new_unchecked(base), FIXTURE_ARENA_SIZE)
        };
        Self {
            heap: Heap::new(region, config),
            _guard: guard,
        }
    }
}

impl TestFixture for HeapFixture {
    fn setup() -> Result<Self, &'static str> {
        Ok(Self::with_config(fixture_config()))
    }
}

pub const SBRK_WINDOW_SIZE: usize = 128 * 1024;

#[repr(C, align(16))]
struct SbrkWindow([u8; SBRK_WINDOW_SIZE]);

static mut SBRK_WINDOW: SbrkWindow = SbrkWindow([0; SBRK_WINDOW_SIZE]);
static SBRK_LOCK: Mutex<()> = Mutex::new(());
static SBRK_BREAK: AtomicUsize = AtomicUsize::new(0);
static SBRK_CALLS: AtomicUsize = AtomicUsize::new(0);
static SBRK_SKIP_GAP: AtomicBool = AtomicBool::new(false);

/// `sbrk` over a static window. With the gap switch on, every call after the
/// first leaves a 64 byte hole before the extent it returns.
unsafe extern "C" fn window_sbrk(increment: isize) -> *mut c_void {
    let Ok(increment) = usize::try_from(increment) else {
        return -1isize as *mut c_void;
    };
    let calls = SBRK_CALLS.fetch_add(1, Ordering::Relaxed);
    let gap = if calls > 0 && SBRK_SKIP_GAP.load(Ordering::Relaxed) {
        64
    } else {
        0
    };
    let current = SBRK_BREAK.load(Ordering::Relaxed);
    let start = current + gap;
    if start + increment > SBRK_WINDOW_SIZE {
        return -1isize as *mut c_void;
    }
    SBRK_BREAK.store(start + increment, Ordering::Relaxed);
    (&raw mut SBRK_WINDOW).cast::<u8>().wrapping_add(start).cast()
}

/// A heap grown through [`window_sbrk`].
pub struct SbrkFixture {
    pub heap: Heap<SbrkSource>,
    _guard: MutexGuard<'static, ()>,
}

impl SbrkFixture {
    pub fn new(config: HeapConfig, leave_gaps: bool) -> Self {
        let guard = SBRK_LOCK.lock();
        SBRK_BREAK.store(0, Ordering::Relaxed);
        SBRK_CALLS.store(0, Ordering::Relaxed);
        SBRK_SKIP_GAP.store(leave_gaps, Ordering::Relaxed);
        // SAFETY: window_sbrk is contiguous (unless asked for gaps, which the
        // heap must refuse) and the lock makes this heap its only user.
        let source = unsafe { SbrkSource::new(window_sbrk) };
        Self {
            heap: Heap::new(source, config),
            _guard: guard,
        }
    }

    /// Bytes handed out so far.
    pub fn break_offset(&self) -> usize {
        SBRK_BREAK.load(Ordering::Relaxed)
    }
}

impl TestFixture for SbrkFixture {
    fn setup() -> Result<Self, &'static str> {
        Ok(Self::new(fixture_config(), false))
    }
}
