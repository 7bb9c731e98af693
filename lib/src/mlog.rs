//! Leveled logging for the allocator.
//!
//! There is no console in a freestanding libc, so output goes to a sink the
//! embedding runtime attaches with [`mlog_attach_sink`]. Until one is attached
//! every message is dropped. Sinks run while the heap lock may be held and
//! must not allocate through this library.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;

use crate::init_flag::InitFlag;

/// Receives formatted output one fragment at a time; a message ends with `"\n"`.
pub type LogSink = fn(&str);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name as used on configuration command lines.
    pub fn from_name(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("error") {
            Some(LogLevel::Error)
        } else if value.eq_ignore_ascii_case("warn") || value.eq_ignore_ascii_case("warning") {
            Some(LogLevel::Warn)
        } else if value.eq_ignore_ascii_case("info") {
            Some(LogLevel::Info)
        } else if value.eq_ignore_ascii_case("debug") {
            Some(LogLevel::Debug)
        } else if value.eq_ignore_ascii_case("trace") {
            Some(LogLevel::Trace)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static SINK_ATTACHED: InitFlag = InitFlag::new();
static SINK: Mutex<Option<LogSink>> = Mutex::new(None);

#[inline(always)]
fn is_enabled(level: LogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

fn current_sink() -> Option<LogSink> {
    if !SINK_ATTACHED.is_set_relaxed() {
        return None;
    }
    *SINK.lock()
}

pub fn log_args(level: LogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    let Some(sink) = current_sink() else {
        return;
    };
    struct SinkWriter(LogSink);
    impl fmt::Write for SinkWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            (self.0)(s);
            Ok(())
        }
    }
    let _ = fmt::write(&mut SinkWriter(sink), args);
    sink("\n");
}

pub fn mlog_init() {
    CURRENT_LEVEL.store(LogLevel::Info as u8, Ordering::Relaxed);
    mlog_detach_sink();
}
pub fn mlog_attach_sink(sink: LogSink) {
    *SINK.lock() = Some(sink);
    SINK_ATTACHED.mark_set();
}
pub fn mlog_detach_sink() {
    SINK_ATTACHED.reset();
    *SINK.lock() = None;
}
pub fn mlog_set_level(level: LogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}
pub fn mlog_get_level() -> LogLevel {
    LogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}
pub fn mlog_is_enabled(level: LogLevel) -> bool {
    is_enabled(level)
}

#[macro_export]
macro_rules! mlog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::mlog::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! mlog_error {
    ($($arg:tt)*) => {
        $crate::mlog::log_args($crate::mlog::LogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! mlog_warn {
    ($($arg:tt)*) => {
        $crate::mlog::log_args($crate::mlog::LogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! mlog_info {
    ($($arg:tt)*) => {
        $crate::mlog::log_args($crate::mlog::LogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! mlog_debug {
    ($($arg:tt)*) => {
        $crate::mlog::log_args($crate::mlog::LogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! mlog_trace {
    ($($arg:tt)*) => {
        $crate::mlog::log_args($crate::mlog::LogLevel::Trace, ::core::format_args!($($arg)*))
    };
}
