//! Per-category time accumulator.

use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSecondsWithFrac, serde_as};

use crate::TaskGroup;

/// Time spent per [`TaskGroup`], plus the running total.
///
/// Fields are private so that `total` always equals the sum of the category
/// fields; all updates go through [`Breakdown::add_time`] or the `Add` impls.
/// Serialized as f64 milliseconds with `_ms` field names.
#[serde_as]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Breakdown {
    #[serde(rename = "parse_html_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    parse_html: Duration,
    #[serde(rename = "style_layout_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    style_layout: Duration,
    #[serde(rename = "paint_composite_render_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    paint_composite_render: Duration,
    #[serde(rename = "script_parse_compile_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    script_parse_compile: Duration,
    #[serde(rename = "script_evaluation_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    script_evaluation: Duration,
    #[serde(rename = "garbage_collection_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    garbage_collection: Duration,
    #[serde(rename = "other_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    other: Duration,
    #[serde(rename = "total_ms")]
    #[serde_as(as = "DurationMilliSecondsWithFrac")]
    total: Duration,
}

impl Breakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// A breakdown holding `time` under `group` and nothing else.
    pub fn from_self_time(group: TaskGroup, time: Duration) -> Self {
        let mut breakdown = Self::new();
        breakdown.add_time(group, time);
        breakdown
    }

    /// Adds `time` to `group`'s bucket and to the total.
    pub fn add_time(&mut self, group: TaskGroup, time: Duration) {
        *self.slot_mut(group) += time;
        self.total += time;
    }

    pub fn get(&self, group: TaskGroup) -> Duration {
        match group {
            TaskGroup::ParseHtml => self.parse_html,
            TaskGroup::StyleLayout => self.style_layout,
            TaskGroup::PaintCompositeRender => self.paint_composite_render,
            TaskGroup::ScriptParseCompile => self.script_parse_compile,
            TaskGroup::ScriptEvaluation => self.script_evaluation,
            TaskGroup::GarbageCollection => self.garbage_collection,
            TaskGroup::Other => self.other,
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_zero()
    }

    /// Non-zero categories in [`TaskGroup::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskGroup, Duration)> + '_ {
        TaskGroup::ALL
            .into_iter()
            .map(|g| (g, self.get(g)))
            .filter(|(_, d)| !d.is_zero())
    }

    fn slot_mut(&mut self, group: TaskGroup) -> &mut Duration {
        match group {
            TaskGroup::ParseHtml => &mut self.parse_html,
            TaskGroup::StyleLayout => &mut self.style_layout,
            TaskGroup::PaintCompositeRender => &mut self.paint_composite_render,
            TaskGroup::ScriptParseCompile => &mut self.script_parse_compile,
            TaskGroup::ScriptEvaluation => &mut self.script_evaluation,
            TaskGroup::GarbageCollection => &mut self.garbage_collection,
            TaskGroup::Other => &mut self.other,
        }
    }
}

impl AddAssign<&Breakdown> for Breakdown {
    fn add_assign(&mut self, rhs: &Breakdown) {
        for group in TaskGroup::ALL {
            self.add_time(group, rhs.get(group));
        }
    }
}

impl AddAssign for Breakdown {
    fn add_assign(&mut self, rhs: Breakdown) {
        *self += &rhs;
    }
}

impl Add for Breakdown {
    type Output = Breakdown;

    fn add(mut self, rhs: Breakdown) -> Breakdown {
        self += &rhs;
        self
    }
}

impl<'a> Sum<&'a Breakdown> for Breakdown {
    fn sum<I: Iterator<Item = &'a Breakdown>>(iter: I) -> Self {
        iter.fold(Breakdown::new(), |mut acc, b| {
            acc += b;
            acc
        })
    }
}

impl Sum for Breakdown {
    fn sum<I: Iterator<Item = Breakdown>>(iter: I) -> Self {
        iter.fold(Breakdown::new(), Add::add)
    }
}
