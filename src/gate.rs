//! Limit/enable gate for instance generation.

use crate::config::RecurrenceConfig;

/// Whether a trigger may generate any instances at all.
pub fn should_generate(config: &RecurrenceConfig) -> bool {
    config.enabled
}

/// Number of pending instances to keep ahead of "now" per parent.
///
/// Never less than one: a limit of zero is rejected at config time, and an
/// enabled gate always materializes at least the next instance.
pub fn horizon_for(config: &RecurrenceConfig) -> u32 {
    config.limit.max(1)
}
