//! `<stdlib.h>` allocation functions.
//!
//! Every failure becomes a null return. A bad pointer passed to `free` or
//! `realloc` is logged by the heap and, with `heap.abort=on`, stops the
//! process through [`abort`].

use core::ffi::{c_char, c_int, c_void, CStr};
use core::ptr::{self, NonNull};

use minlibc_abi::{AllocError, AllocResult, HeapStats};
use minlibc_heap::{DebugFlags, HeapConfig, SbrkFn};
use minlibc_lib::mlog_error;

use crate::abort::abort;
use crate::process_heap::{self, process_heap};

#[allow(non_camel_case_types)]
pub type size_t = usize;

fn into_c_ptr(result: AllocResult<NonNull<u8>>) -> *mut c_void {
    result.map_or(ptr::null_mut(), |ptr| ptr.as_ptr().cast())
}

/// Whether `err` must stop the process under `config`.
fn is_fatal(config: &HeapConfig, err: AllocError) -> bool {
    err.is_corruption() && config.debug.contains(DebugFlags::ABORT_ON_CORRUPTION)
}

fn handle_pointer_error(op: &str, ptr: *mut c_void, err: AllocError) {
    if is_fatal(&process_heap().config(), err) {
        mlog_error!("{}({:#x}): {}, aborting", op, ptr as usize, err);
        abort();
    }
}

#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn malloc(size: size_t) -> *mut c_void {
    into_c_ptr(process_heap().malloc(size))
}

#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn calloc(count: size_t, size: size_t) -> *mut c_void {
    into_c_ptr(process_heap().calloc(count, size))
}

/// # Safety
///
/// `ptr` must be null or a pointer returned by this allocator and not yet
/// freed.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
    match process_heap().realloc(ptr.cast(), size) {
        Ok(Some(new)) => new.as_ptr().cast(),
        Ok(None) => ptr::null_mut(),
        Err(err) => {
            handle_pointer_error("realloc", ptr, err);
            ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `ptr` must be null or a pointer returned by this allocator and not yet
/// freed.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if let Err(err) = process_heap().free(ptr.cast()) {
        handle_pointer_error("free", ptr, err);
    }
}

#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn aligned_alloc(alignment: size_t, size: size_t) -> *mut c_void {
    into_c_ptr(process_heap().aligned_alloc(alignment, size))
}

/// Apply `heap.*` tokens before the first allocation. Returns 0, or -1 when
/// the string is null or not UTF-8 or the heap is already in use.
///
/// # Safety
///
/// `cmdline` must be null or point to a NUL-terminated string.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn minlibc_heap_configure(cmdline: *const c_char) -> c_int {
    if cmdline.is_null() {
        return -1;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let Ok(cmdline) = unsafe { CStr::from_ptr(cmdline) }.to_str() else {
        return -1;
    };
    match process_heap::configure(cmdline) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Grow the heap with `sbrk` instead of the static arena. Returns 0, or -1
/// when `sbrk` is null or the heap is already in use.
///
/// # Safety
///
/// `sbrk` must behave like POSIX `sbrk` and no one else may move the break.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn minlibc_heap_use_sbrk(sbrk: Option<SbrkFn>) -> c_int {
    let Some(sbrk) = sbrk else {
        return -1;
    };
    // SAFETY: forwarded caller contract.
    match unsafe { process_heap::use_sbrk(sbrk) } {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Copy the heap statistics into `out`. Returns 0 or `AllocError` code.
///
/// # Safety
///
/// `out` must be null or valid for a `HeapStats` write.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn minlibc_heap_stats(out: *mut HeapStats) -> c_int {
    if out.is_null() {
        return AllocError::InvalidPointer.as_c_int();
    }
    let stats = process_heap().stats();
    // SAFETY: non-null and writable per the caller contract.
    unsafe { out.write(stats) };
    0
}

/// Walk the heap and verify its invariants. Returns 0 or `AllocError` code.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn minlibc_heap_check() -> c_int {
    match process_heap().check() {
        Ok(()) => 0,
        Err(err) => err.as_c_int(),
    }
}

#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn minlibc_heap_print_stats() {
    process_heap().print_stats();
}
