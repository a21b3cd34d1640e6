//! Report types produced by the summarizer.
//!
//! A [`Summary`] is derived and read-only: it is built fresh from the
//! analyzed task tree and never fed back into it. Attributions are referred
//! to by [`AttributionId`]; [`Summary::attributions`] is the snapshot that
//! resolves them, so consumers never need the interning table.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Attribution, AttributionContext, AttributionId, Breakdown};

/// Stable identifier of a task, assigned in pre-order at construction.
///
/// The join key for every cross-reference in the output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Self-only breakdown per attribution, keyed by attribution id.
pub type BreakdownsByAttribution = IndexMap<AttributionId, Breakdown>;

/// One step of a task's play-by-play: what ran, in order, and where its
/// self time went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayByPlayEntry {
    /// Task label. Merged runs read `"Name (xN)"`.
    pub name: String,
    pub attribution: AttributionId,
    /// Self time only; descendants have their own entries.
    pub breakdown: Breakdown,
    pub task_ids: Vec<TaskId>,
}

/// Time statistics for one attribution (or one task).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionStatistics {
    pub attribution: AttributionId,
    pub context: AttributionContext,
    /// Subtree breakdown; summed over instances for cumulative statistics.
    pub breakdown: Breakdown,
    /// Time spent under other attributions invoked from this one.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub breakdowns_by_attribution: BreakdownsByAttribution,
    /// Tasks that contributed, in contribution order.
    pub task_ids: Vec<TaskId>,
    /// Only present for single-task statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_by_play: Option<Vec<PlayByPlayEntry>>,
    /// Only present for single-task statistics.
    #[serde(
        rename = "start_time_ms",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_duration::option"
    )]
    pub start_time: Option<Duration>,
    /// Largest single instance behind cumulative statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest_instance: Option<Box<AttributionStatistics>>,
}

/// Statistics grouped by attribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ByAttribution {
    /// Sum over every attribution root, largest first.
    pub by_cumulative_duration: Vec<AttributionStatistics>,
    /// The single largest attribution root, largest first.
    pub by_longest_instance_duration: Vec<AttributionStatistics>,
}

/// The analysis report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Interned attributions, indexed by [`AttributionId`].
    pub attributions: Vec<Attribution>,
    pub by_attribution: ByAttribution,
    /// Per-task statistics for attribution roots, largest first.
    pub by_task_duration: Vec<AttributionStatistics>,
}

impl Summary {
    /// Resolves an attribution id against the snapshot.
    pub fn attribution(&self, id: AttributionId) -> Option<&Attribution> {
        self.attributions.get(id.index())
    }
}
