//! Heap tuning knobs and their command-line form.
//!
//! ```text
//! heap.fit=best heap.split=64 heap.initial=128K heap.grow=64K heap.verify=on heap.log=debug
//! ```

use bitflags::bitflags;
use minlibc_lib::LogLevel;

use crate::block::MIN_PAYLOAD;

pub const HEAP_DEFAULT_INITIAL_SIZE: usize = 64 * 1024;
pub const HEAP_DEFAULT_GROW_STEP: usize = 64 * 1024;

/// Free block selection policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitPolicy {
    /// First block large enough, in free-list traversal order.
    FirstFit,
    /// Smallest block large enough; ties go to the first one discovered.
    BestFit,
}

bitflags! {
    /// Optional checking performed by the heap.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DebugFlags: u32 {
        /// Run the full integrity walk after every free.
        const VERIFY_ON_FREE = 1 << 0;
        /// Overwrite freed payloads with `POISON_BYTE`.
        const POISON_FREED = 1 << 1;
        /// Stop the process when a bad pointer or damaged header is seen.
        const ABORT_ON_CORRUPTION = 1 << 2;
    }
}

pub const POISON_BYTE: u8 = 0xDD;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    pub fit: FitPolicy,
    /// Smallest payload worth splitting off as a separate free block.
    pub min_split: usize,
    /// Bytes requested from the memory source when the arena is created.
    pub initial_size: usize,
    /// Minimum bytes requested whenever the arena grows.
    pub grow_step: usize,
    pub debug: DebugFlags,
    /// Log level to apply when the heap is installed, if any.
    pub log_level: Option<LogLevel>,
}

impl HeapConfig {
    pub const DEFAULT: Self = Self {
        fit: FitPolicy::FirstFit,
        min_split: MIN_PAYLOAD,
        initial_size: HEAP_DEFAULT_INITIAL_SIZE,
        grow_step: HEAP_DEFAULT_GROW_STEP,
        debug: DebugFlags::ABORT_ON_CORRUPTION,
        log_level: None,
    };

    pub const fn with_fit(mut self, fit: FitPolicy) -> Self {
        self.fit = fit;
        self
    }

    pub const fn with_min_split(mut self, min_split: usize) -> Self {
        self.min_split = min_split;
        self
    }

    pub const fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    pub const fn with_grow_step(mut self, grow_step: usize) -> Self {
        self.grow_step = grow_step;
        self
    }

    pub const fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    /// Payload the remainder of a split must at least keep.
    #[inline]
    pub fn split_threshold(&self) -> usize {
        self.min_split.max(MIN_PAYLOAD)
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn fit_from_string(value: &str) -> Option<FitPolicy> {
    if value.eq_ignore_ascii_case("first") || value.eq_ignore_ascii_case("first-fit") {
        Some(FitPolicy::FirstFit)
    } else if value.eq_ignore_ascii_case("best") || value.eq_ignore_ascii_case("best-fit") {
        Some(FitPolicy::BestFit)
    } else {
        None
    }
}

fn parse_on_off_flag(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("1")
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("0")
    {
        Some(false)
    } else {
        None
    }
}

/// Byte count with an optional `K`/`M` suffix.
fn parse_size(value: &str) -> Option<usize> {
    let (digits, scale) = match value.as_bytes().last()? {
        b'k' | b'K' => (&value[..value.len() - 1], 1024),
        b'm' | b'M' => (&value[..value.len() - 1], 1024 * 1024),
        _ => (value, 1),
    };
    digits.parse::<usize>().ok()?.checked_mul(scale)
}

fn apply_flag(config: &mut HeapConfig, flag: DebugFlags, value: &str) {
    if let Some(enabled) = parse_on_off_flag(value) {
        config.debug.set(flag, enabled);
    }
}

fn process_token(config: &mut HeapConfig, token: &str) {
    let Some(rest) = token.strip_prefix("heap.") else {
        return;
    };
    let Some((key, value)) = rest.split_once('=') else {
        return;
    };
    match key {
        "fit" => {
            if let Some(fit) = fit_from_string(value) {
                config.fit = fit;
            }
        }
        "split" => {
            if let Some(split) = parse_size(value) {
                config.min_split = split;
            }
        }
        "initial" => {
            if let Some(size) = parse_size(value) {
                config.initial_size = size;
            }
        }
        "grow" => {
            if let Some(size) = parse_size(value) {
                config.grow_step = size;
            }
        }
        "verify" => apply_flag(config, DebugFlags::VERIFY_ON_FREE, value),
        "poison" => apply_flag(config, DebugFlags::POISON_FREED, value),
        "abort" => apply_flag(config, DebugFlags::ABORT_ON_CORRUPTION, value),
        "log" => {
            if let Some(level) = LogLevel::from_name(value) {
                config.log_level = Some(level);
            }
        }
        _ => {}
    }
}

/// Build a configuration from whitespace separated `heap.*` tokens, starting
/// from [`HeapConfig::DEFAULT`]. Unknown or malformed tokens are ignored.
pub fn config_from_cmdline(cmdline: Option<&str>) -> HeapConfig {
    let mut config = HeapConfig::DEFAULT;
    if let Some(cmdline) = cmdline {
        apply_cmdline(&mut config, cmdline);
    }
    config
}

/// Apply `heap.*` tokens on top of an existing configuration.
pub fn apply_cmdline(config: &mut HeapConfig, cmdline: &str) {
    for token in cmdline.split_ascii_whitespace() {
        process_token(config, token);
    }
}
