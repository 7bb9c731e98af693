pub const SUITE_HEAP: u32 = 1 << 0;
pub const SUITE_STDLIB: u32 = 1 << 1;
pub const SUITE_STRESS: u32 = 1 << 2;
pub const SUITE_ALL: u32 = SUITE_HEAP | SUITE_STDLIB | SUITE_STRESS;
