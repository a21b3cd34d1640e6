//! Subtree breakdowns.
//!
//! A task's breakdown is its own self time, filed under its group, plus
//! the breakdowns of all its children. Breakdowns are computed bottom-up in
//! one pass, so every task's total ends up equal to its duration unless its
//! children overran it.

use indexmap::IndexMap;
use traceblame_graph::TaskTree;
use traceblame_schemas::{AttributionId, Breakdown, BreakdownsByAttribution};
use tracing::{debug, debug_span, info, warn};

/// Breakdowns of attribution roots, summed per attribution.
///
/// Because attribution roots never nest inside a root of the same
/// attribution, no time is counted twice within one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakdownRollup {
    by_attribution: IndexMap<AttributionId, Breakdown>,
}

impl BreakdownRollup {
    pub fn get(&self, attribution: AttributionId) -> Option<&Breakdown> {
        self.by_attribution.get(&attribution)
    }

    /// Entries in first-seen (pre-order) order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributionId, &Breakdown)> {
        self.by_attribution.iter().map(|(&id, b)| (id, b))
    }

    pub fn len(&self) -> usize {
        self.by_attribution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_attribution.is_empty()
    }
}

/// Fills `metadata.breakdown` and `metadata.breakdowns_by_attribution` for
/// every task in `tree`.
///
/// Self time is the task's duration minus its children's breakdown totals.
/// Children that overrun their parent would make it negative; it is
/// floored at zero with a warning.
///
/// A child with the parent's attribution is looked through: its own
/// per-attribution map is merged into the parent's. A child with another
/// attribution contributes its whole breakdown under its own id.
///
/// Reads `is_attribution_root`, so run after attribution roots are marked.
pub fn compute_breakdowns(tree: &mut TaskTree) -> BreakdownRollup {
    let _span = debug_span!("compute_breakdowns").entered();

    for id in tree.postorder() {
        let node = &tree[id];
        let attribution = node.metadata.attribution;
        let mut breakdown = Breakdown::new();
        let mut by_attribution = BreakdownsByAttribution::new();
        for &child in &node.children {
            let child = &tree[child].metadata;
            breakdown += &child.breakdown;
            if child.attribution == attribution {
                merge_into(
                    &mut by_attribution,
                    &child.breakdowns_by_attribution,
                );
            } else {
                *by_attribution.entry(child.attribution).or_default() +=
                    &child.breakdown;
            }
        }

        let subtree = breakdown.total();
        if subtree > node.duration {
            warn!(
                task_id = %id,
                duration_us = node.duration.as_micros(),
                children_us = subtree.as_micros(),
                "children overrun their parent, flooring self time at zero"
            );
        }
        let self_time = node.duration.saturating_sub(subtree);
        breakdown.add_time(node.group, self_time);
        debug!(
            task_id = %id,
            self_us = self_time.as_micros(),
            total_us = breakdown.total().as_micros(),
            "computed breakdown"
        );

        let metadata = &mut tree[id].metadata;
        metadata.breakdown = breakdown;
        metadata.breakdowns_by_attribution = by_attribution;
    }

    let mut rollup = BreakdownRollup::default();
    for node in tree.iter() {
        if node.metadata.context.is_attribution_root {
            *rollup
                .by_attribution
                .entry(node.metadata.attribution)
                .or_default() += &node.metadata.breakdown;
        }
    }
    info!(
        tasks = tree.len(),
        attributions = rollup.len(),
        "computed breakdowns"
    );
    rollup
}

/// Adds every entry of `from` into `into`, summing shared keys.
pub(crate) fn merge_into(
    into: &mut BreakdownsByAttribution,
    from: &BreakdownsByAttribution,
) {
    for (&id, breakdown) in from {
        *into.entry(id).or_default() += breakdown;
    }
}
