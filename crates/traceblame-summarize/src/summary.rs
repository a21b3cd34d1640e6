//! Per-attribution summaries.

use std::cmp::Reverse;

use indexmap::IndexMap;
use indexmap::map::Entry;
use traceblame_attribute::{AttributionTable, is_attributed_to};
use traceblame_graph::{TaskNode, TaskTree};
use traceblame_schemas::{
    AttributionId, AttributionStatistics, ByAttribution, Summary,
};
use tracing::{debug, debug_span, info};

use crate::breakdowns::merge_into;

/// Which attribution roots a summary counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Only count tasks attributed to a script whose URL contains this.
    pub script_url_pattern: Option<String>,
    /// Only count tasks that are top-level in the tree.
    pub top_level_only: bool,
}

impl SummaryOptions {
    fn includes(&self, table: &AttributionTable, node: &TaskNode) -> bool {
        let metadata = &node.metadata;
        if self.top_level_only && !metadata.context.is_top_level {
            return false;
        }
        self.script_url_pattern.as_deref().is_none_or(|pattern| {
            is_attributed_to(
                &table[metadata.attribution],
                &metadata.context,
                pattern,
                None,
            )
        })
    }
}

/// Summarizes the attribution roots of `tree`.
///
/// Every root is reported on its own (`by_task_duration`), summed with the
/// other roots of its attribution (`by_cumulative_duration`), and
/// considered for its attribution's longest instance
/// (`by_longest_instance_duration`). All three lists are sorted by total
/// time, largest first; ties keep tree order.
///
/// Needs breakdowns and play-by-plays in place.
pub fn summarize(
    tree: &TaskTree,
    table: &AttributionTable,
    options: &SummaryOptions,
) -> Summary {
    let _span = debug_span!("summarize").entered();

    let mut cumulative: IndexMap<AttributionId, AttributionStatistics> =
        IndexMap::new();
    let mut longest: IndexMap<AttributionId, AttributionStatistics> =
        IndexMap::new();
    let mut by_task_duration = Vec::new();

    for id in tree.postorder() {
        let node = &tree[id];
        if !node.metadata.context.is_attribution_root
            || !options.includes(table, node)
        {
            continue;
        }
        let attribution = node.metadata.attribution;

        match cumulative.entry(attribution) {
            Entry::Vacant(entry) => {
                entry.insert(instance_statistics(node));
            }
            Entry::Occupied(mut entry) => {
                accumulate(entry.get_mut(), node);
            }
        }

        let stats = task_statistics(node);
        let total = stats.breakdown.total();
        if longest
            .get(&attribution)
            .is_none_or(|l| total > l.breakdown.total())
        {
            longest.insert(attribution, stats.clone());
        }
        debug!(
            task_id = %id,
            %attribution,
            total_us = total.as_micros(),
            "counted attribution root"
        );
        by_task_duration.push(stats);
    }

    for (attribution, stats) in &mut cumulative {
        stats.longest_instance =
            longest.get(attribution).cloned().map(Box::new);
    }

    let mut by_cumulative_duration: Vec<_> = cumulative.into_values().collect();
    let mut by_longest_instance_duration: Vec<_> =
        longest.into_values().collect();
    for list in [
        &mut by_cumulative_duration,
        &mut by_longest_instance_duration,
        &mut by_task_duration,
    ] {
        list.sort_by_key(|s| Reverse(s.breakdown.total()));
    }

    info!(
        attributions = by_cumulative_duration.len(),
        tasks = by_task_duration.len(),
        "summarized attribution roots"
    );
    Summary {
        attributions: table.snapshot(),
        by_attribution: ByAttribution {
            by_cumulative_duration,
            by_longest_instance_duration,
        },
        by_task_duration,
    }
}

/// Statistics for `node` alone, as a cumulative entry starts out.
fn instance_statistics(node: &TaskNode) -> AttributionStatistics {
    let metadata = &node.metadata;
    AttributionStatistics {
        attribution: metadata.attribution,
        context: metadata.context.clone(),
        breakdown: metadata.breakdown,
        breakdowns_by_attribution: metadata.breakdowns_by_attribution.clone(),
        task_ids: vec![node.id],
        play_by_play: None,
        start_time: None,
        longest_instance: None,
    }
}

/// Statistics for `node` alone, with its play-by-play and start time.
fn task_statistics(node: &TaskNode) -> AttributionStatistics {
    AttributionStatistics {
        play_by_play: Some(node.metadata.play_by_play.clone()),
        start_time: Some(node.start_time),
        ..instance_statistics(node)
    }
}

fn accumulate(stats: &mut AttributionStatistics, node: &TaskNode) {
    let metadata = &node.metadata;
    stats.breakdown += &metadata.breakdown;
    stats.context.merge(&metadata.context);
    if !stats.task_ids.contains(&node.id) {
        stats.task_ids.push(node.id);
    }
    merge_into(
        &mut stats.breakdowns_by_attribution,
        &metadata.breakdowns_by_attribution,
    );
}
