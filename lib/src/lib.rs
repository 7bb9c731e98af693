#![no_std]

#[cfg(test)]
extern crate std;

pub mod alignment;
pub mod init_flag;
pub mod mlog;
pub mod testing;

pub use alignment::{align_down, align_up, align_up_checked, is_aligned};
pub use init_flag::InitFlag;
pub use mlog::{
    mlog_attach_sink, mlog_detach_sink, mlog_get_level, mlog_init, mlog_is_enabled,
    mlog_set_level, LogLevel, LogSink,
};

#[doc(hidden)]
pub use paste;
