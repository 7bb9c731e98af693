use minlibc_lib::mlog_error;
use spin::Mutex;

/// Called by [`abort`] before the process stops. Expected not to return.
pub type AbortHook = unsafe extern "C" fn();

static ABORT_HOOK: Mutex<Option<AbortHook>> = Mutex::new(None);

/// Install (or with `None`, remove) the hook `abort` runs.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn minlibc_set_abort_hook(hook: Option<AbortHook>) {
    *ABORT_HOOK.lock() = hook;
}

/// Terminate abnormally. Runs the installed hook; if there is none or it
/// returns, spins forever.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn abort() -> ! {
    let hook = *ABORT_HOOK.lock();
    if let Some(hook) = hook {
        // SAFETY: installed through `minlibc_set_abort_hook` by a C caller
        // that owns its behaviour.
        unsafe { hook() };
    }
    mlog_error!("abort: halting");
    loop {
        core::hint::spin_loop();
    }
}
