//! Shared fixtures and proptest strategies for schema tests.

use std::time::Duration;

use proptest::prelude::*;

use crate::{Breakdown, TaskGroup};

/// Shorthand for whole milliseconds.
pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn arb_task_group() -> impl Strategy<Value = TaskGroup> {
    proptest::sample::select(TaskGroup::ALL.to_vec())
}

/// Breakdowns with integer-microsecond buckets.
pub fn arb_breakdown() -> impl Strategy<Value = Breakdown> {
    proptest::collection::vec(
        (arb_task_group(), (0..10_000_000u64).prop_map(Duration::from_micros)),
        0..6,
    )
    .prop_map(|parts| {
        let mut breakdown = Breakdown::new();
        for (group, time) in parts {
            breakdown.add_time(group, time);
        }
        breakdown
    })
}
