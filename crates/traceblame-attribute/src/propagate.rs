//! Attribution propagation to a fixed point.
//!
//! Assignment looks at each task in isolation. Propagation then lets tasks
//! borrow precision from their surroundings:
//!
//! - **Scope**: a parent's attribution flows down to its children, and the
//!   attribution shared by all children of a nested task flows up to it.
//! - **Sequence**: within one sibling list, a source location flows to the
//!   neighbouring file-attributed siblings of the same script.
//!
//! Every move goes through [`refine`], which only ever increases
//! specificity, so each task changes at most twice and the loops terminate.
//! The iteration limit bounds them anyway.

use traceblame_graph::TaskTree;
use traceblame_schemas::{Attribution, AttributionId, Specificity, TaskId};
use tracing::{debug, debug_span, info, warn};

use crate::frames::{FrameInfoMap, infer_frame_source_locations};
use crate::table::AttributionTable;

pub const DEFAULT_ITERATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationOptions {
    /// Bound on both the propagation loop and the re-inference loop.
    pub iteration_limit: usize,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            iteration_limit: DEFAULT_ITERATION_LIMIT,
        }
    }
}

/// How a bounded iterative pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    /// Iterations run, including the final one that changed nothing.
    pub iterations: usize,
    /// False if the limit was hit while the last iteration still changed
    /// something.
    pub converged: bool,
}

/// Returns `candidate` if it is a strict improvement on `current`.
///
/// - a source location is never replaced
/// - a file is replaced only by a source location in the same script
/// - unknown is replaced by anything known
pub fn refine(
    table: &AttributionTable,
    current: AttributionId,
    candidate: AttributionId,
) -> AttributionId {
    match (&table[current], &table[candidate]) {
        (Attribution::SourceLocation(_), _) => current,
        (Attribution::File { url }, Attribution::SourceLocation(loc))
            if *url == loc.url =>
        {
            candidate
        }
        (Attribution::File { .. }, _) => current,
        (Attribution::Unknown, found) if !found.is_unknown() => candidate,
        (Attribution::Unknown, _) => current,
    }
}

/// Runs scope then sequence propagation until neither changes anything.
pub fn propagate_attributions(
    tree: &mut TaskTree,
    table: &mut AttributionTable,
    options: &PropagationOptions,
) -> FixedPoint {
    let _span = debug_span!("propagate_attributions").entered();

    let roots = tree.roots().to_vec();
    for iteration in 1..=options.iteration_limit {
        let by_scope = propagate_by_scope(tree, table, &roots, None);
        let by_sequence = propagate_by_sequence(tree, table, &roots);
        debug!(iteration, by_scope, by_sequence, "propagation iteration");
        if !by_scope && !by_sequence {
            return FixedPoint {
                iterations: iteration,
                converged: true,
            };
        }
    }

    warn!(
        limit = options.iteration_limit,
        "attribution propagation hit the iteration limit; keeping last state"
    );
    FixedPoint {
        iterations: options.iteration_limit,
        converged: false,
    }
}

/// Alternates propagation with frame re-inference until no task gains a
/// position from a newly known frame.
///
/// Converged only if every inner propagation run converged as well.
pub fn propagate_and_infer(
    tree: &mut TaskTree,
    table: &mut AttributionTable,
    frames: &mut FrameInfoMap,
    options: &PropagationOptions,
) -> FixedPoint {
    let _span = debug_span!("propagate_and_infer").entered();

    let mut propagation_converged = true;
    for iteration in 1..=options.iteration_limit {
        propagation_converged &=
            propagate_attributions(tree, table, options).converged;
        infer_frame_source_locations(tree, frames);
        if !update_frame_attributions(tree, table, frames) {
            info!(
                iteration,
                attributions = table.len(),
                propagation_converged,
                "attribution inference finished"
            );
            return FixedPoint {
                iterations: iteration,
                converged: propagation_converged,
            };
        }
    }

    warn!(
        limit = options.iteration_limit,
        "attribution inference hit the iteration limit; keeping last state"
    );
    FixedPoint {
        iterations: options.iteration_limit,
        converged: false,
    }
}

/// Upgrades tasks that are not yet source-located but whose frame id now
/// has a known position. A script-start frame only upgrades unknown tasks,
/// and only to a file attribution.
pub(crate) fn update_frame_attributions(
    tree: &mut TaskTree,
    table: &mut AttributionTable,
    frames: &FrameInfoMap,
) -> bool {
    let mut changed = false;
    for id in tree.preorder() {
        let current = tree[id].metadata.attribution;
        if table[current].specificity() == Specificity::SourceLocation {
            continue;
        }
        let Some(info) = tree[id].event.frame().and_then(|f| frames.get(f))
        else {
            continue;
        };

        let updated = if info.is_script_start() {
            if !table[current].is_unknown() {
                continue;
            }
            table.intern(Attribution::file(&info.url))
        } else {
            table.intern(info.clone().into())
        };
        if updated != current {
            debug!(task_id = %id, "attributed task from inferred frame");
            tree[id].metadata.attribution = updated;
            changed = true;
        }
    }
    changed
}

/// What all children of a task agree on, ignoring unknown children.
enum CommonAttribution {
    /// Every attributed child has this exact source location.
    Exact(AttributionId),
    /// Every attributed child is in this script, at differing positions.
    Script(String),
}

fn common_child_attribution(
    tree: &TaskTree,
    table: &AttributionTable,
    children: &[TaskId],
) -> Option<CommonAttribution> {
    let mut url: Option<&str> = None;
    let mut exact: Option<AttributionId> = None;
    let mut all_exact = true;

    for &child in children {
        let id = tree[child].metadata.attribution;
        let attribution = &table[id];
        let Some(child_url) = attribution.url() else {
            continue;
        };
        match url {
            Some(seen) if seen != child_url => return None,
            _ => url = Some(child_url),
        }
        match (attribution.specificity(), exact) {
            (Specificity::SourceLocation, None) => exact = Some(id),
            (Specificity::SourceLocation, Some(seen)) if seen == id => {}
            _ => all_exact = false,
        }
    }

    let url = url?;
    match exact {
        Some(id) if all_exact => Some(CommonAttribution::Exact(id)),
        _ => Some(CommonAttribution::Script(url.to_owned())),
    }
}

/// One scope pass over `ids` and their subtrees. Returns true if any task
/// changed.
fn propagate_by_scope(
    tree: &mut TaskTree,
    table: &mut AttributionTable,
    ids: &[TaskId],
    scope: Option<AttributionId>,
) -> bool {
    let mut changed = false;
    for &id in ids {
        let current = tree[id].metadata.attribution;
        let attribution =
            scope.map_or(current, |scope| refine(table, current, scope));
        if attribution != current {
            debug!(task_id = %id, "propagated attribution from parent");
            tree[id].metadata.attribution = attribution;
            changed = true;
        }

        let children = tree[id].children.clone();
        changed |=
            propagate_by_scope(tree, table, &children, Some(attribution));

        // Top-level tasks are event loop turns; they stay as assigned.
        if tree[id].is_top_level() {
            continue;
        }
        let common = common_child_attribution(tree, table, &children);
        let candidate = match common {
            Some(CommonAttribution::Exact(candidate)) => candidate,
            // A bare script only improves an unknown task.
            Some(CommonAttribution::Script(url))
                if table[attribution].is_unknown() =>
            {
                table.intern(Attribution::file(url))
            }
            _ => continue,
        };
        let upward = refine(table, attribution, candidate);
        if upward != attribution {
            debug!(task_id = %id, "propagated attribution from children");
            tree[id].metadata.attribution = upward;
            changed = true;
        }
    }
    changed
}

/// One sequence pass over the sibling list `ids`, then over every child
/// list below it. Returns true if any task changed.
fn propagate_by_sequence(
    tree: &mut TaskTree,
    table: &AttributionTable,
    ids: &[TaskId],
) -> bool {
    let is_located = |id: AttributionId| {
        table[id].specificity() == Specificity::SourceLocation
    };

    // The first source location also flows backwards to earlier siblings.
    let mut last = ids
        .iter()
        .map(|&id| tree[id].metadata.attribution)
        .find(|&a| is_located(a));

    let mut changed = false;
    for &id in ids {
        let current = tree[id].metadata.attribution;
        match table[current].specificity() {
            Specificity::SourceLocation => last = Some(current),
            Specificity::File => {
                let Some(last) = last else { continue };
                let refined = refine(table, current, last);
                if refined != current {
                    debug!(
                        task_id = %id,
                        "propagated attribution from sibling"
                    );
                    tree[id].metadata.attribution = refined;
                    changed = true;
                }
            }
            Specificity::Unknown => {}
        }
    }

    for &id in ids {
        let children = tree[id].children.clone();
        changed |= propagate_by_sequence(tree, table, &children);
    }
    changed
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use traceblame_schemas::FrameInfo;

    use super::*;
    use crate::testutil::{make_event, make_location, ms};

    /// Pushes a task with an already-interned attribution.
    fn push(
        tree: &mut TaskTree,
        table: &mut AttributionTable,
        attribution: Attribution,
        parent: Option<TaskId>,
    ) -> TaskId {
        let id = tree.push(make_event("Task"), ms(0), ms(10), parent);
        tree[id].metadata.attribution = table.intern(attribution);
        id
    }

    fn attribution(
        tree: &TaskTree,
        table: &AttributionTable,
        id: TaskId,
    ) -> Attribution {
        table[tree[id].metadata.attribution].clone()
    }

    fn run(tree: &mut TaskTree, table: &mut AttributionTable) -> FixedPoint {
        propagate_attributions(tree, table, &PropagationOptions::default())
    }

    #[test]
    fn test_refine_only_increases_specificity() {
        let mut table = AttributionTable::new();
        let unknown = AttributionId::UNKNOWN;
        let file_a = table.intern(Attribution::file("a.js"));
        let file_b = table.intern(Attribution::file("b.js"));
        let loc_a = table.intern(make_location("a.js", 3, 4));
        let loc_b = table.intern(make_location("b.js", 3, 4));

        assert_eq!(refine(&table, unknown, unknown), unknown);
        assert_eq!(refine(&table, unknown, file_a), file_a);
        assert_eq!(refine(&table, unknown, loc_b), loc_b);
        assert_eq!(refine(&table, file_a, unknown), file_a);
        assert_eq!(refine(&table, file_a, file_b), file_a);
        assert_eq!(refine(&table, file_a, loc_b), file_a);
        assert_eq!(refine(&table, file_a, loc_a), loc_a);
        assert_eq!(refine(&table, loc_a, loc_b), loc_a);
        assert_eq!(refine(&table, loc_a, unknown), loc_a);
    }

    #[test]
    fn test_parent_location_flows_down() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root = push(&mut tree, &mut table, Attribution::Unknown, None);
        let script = push(
            &mut tree,
            &mut table,
            make_location("app.js", 10, 5),
            Some(root),
        );
        let parse =
            push(&mut tree, &mut table, Attribution::Unknown, Some(script));

        run(&mut tree, &mut table);
        assert_eq!(
            attribution(&tree, &table, parse),
            make_location("app.js", 10, 5)
        );
        assert!(attribution(&tree, &table, root).is_unknown());
    }

    #[test]
    fn test_file_children_keep_their_script() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root = push(&mut tree, &mut table, Attribution::Unknown, None);
        let parent = push(
            &mut tree,
            &mut table,
            make_location("app.js", 10, 5),
            Some(root),
        );
        let same = push(
            &mut tree,
            &mut table,
            Attribution::file("app.js"),
            Some(parent),
        );
        let other = push(
            &mut tree,
            &mut table,
            Attribution::file("vendor.js"),
            Some(parent),
        );

        run(&mut tree, &mut table);
        assert_eq!(
            attribution(&tree, &table, same),
            make_location("app.js", 10, 5)
        );
        assert_eq!(
            attribution(&tree, &table, other),
            Attribution::file("vendor.js")
        );
    }

    #[test]
    fn test_single_child_location_flows_up() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root = push(&mut tree, &mut table, Attribution::Unknown, None);
        let wrapper =
            push(&mut tree, &mut table, Attribution::Unknown, Some(root));
        push(
            &mut tree,
            &mut table,
            make_location("app.js", 7, 1),
            Some(wrapper),
        );
        push(&mut tree, &mut table, Attribution::Unknown, Some(wrapper));

        run(&mut tree, &mut table);
        assert_eq!(
            attribution(&tree, &table, wrapper),
            make_location("app.js", 7, 1)
        );
        // Event loop turns are not rewritten from below.
        assert!(attribution(&tree, &table, root).is_unknown());
    }

    #[test]
    fn test_distinct_child_scripts_give_no_common_attribution() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root = push(&mut tree, &mut table, Attribution::Unknown, None);
        let parent =
            push(&mut tree, &mut table, Attribution::Unknown, Some(root));
        push(&mut tree, &mut table, Attribution::file("a.js"), Some(parent));
        push(&mut tree, &mut table, Attribution::file("b.js"), Some(parent));

        let fixed_point = run(&mut tree, &mut table);
        assert!(attribution(&tree, &table, parent).is_unknown());
        assert_eq!(fixed_point.iterations, 1);
    }

    #[test]
    fn test_differing_positions_in_one_script_give_a_file() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root = push(&mut tree, &mut table, Attribution::Unknown, None);
        let parent =
            push(&mut tree, &mut table, Attribution::Unknown, Some(root));
        push(
            &mut tree,
            &mut table,
            make_location("app.js", 1, 5),
            Some(parent),
        );
        push(
            &mut tree,
            &mut table,
            make_location("app.js", 9, 2),
            Some(parent),
        );

        run(&mut tree, &mut table);
        assert_eq!(
            attribution(&tree, &table, parent),
            Attribution::file("app.js")
        );
    }

    #[test]
    fn test_sequence_carries_most_recent_location() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let file = || Attribution::file("a.js");
        let before = push(&mut tree, &mut table, file(), None);
        push(&mut tree, &mut table, make_location("a.js", 1, 5), None);
        let after_first = push(&mut tree, &mut table, file(), None);
        let other_script =
            push(&mut tree, &mut table, Attribution::file("b.js"), None);
        let unknown = push(&mut tree, &mut table, Attribution::Unknown, None);
        push(&mut tree, &mut table, make_location("a.js", 9, 9), None);
        let after_second = push(&mut tree, &mut table, file(), None);

        run(&mut tree, &mut table);
        let first = make_location("a.js", 1, 5);
        let second = make_location("a.js", 9, 9);
        assert_eq!(attribution(&tree, &table, before), first);
        assert_eq!(attribution(&tree, &table, after_first), first);
        assert_eq!(
            attribution(&tree, &table, other_script),
            Attribution::file("b.js")
        );
        assert!(attribution(&tree, &table, unknown).is_unknown());
        assert_eq!(attribution(&tree, &table, after_second), second);
    }

    #[test]
    fn test_converges_in_one_iteration_when_nothing_moves() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        push(&mut tree, &mut table, make_location("a.js", 2, 2), None);
        let fixed_point = run(&mut tree, &mut table);
        assert_eq!(
            fixed_point,
            FixedPoint {
                iterations: 1,
                converged: true
            }
        );
    }

    #[test]
    fn test_converges_in_two_iterations_after_one_change() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root =
            push(&mut tree, &mut table, make_location("a.js", 2, 2), None);
        push(&mut tree, &mut table, Attribution::Unknown, Some(root));
        let fixed_point = run(&mut tree, &mut table);
        assert_eq!(
            fixed_point,
            FixedPoint {
                iterations: 2,
                converged: true
            }
        );
    }

    #[test]
    fn test_iteration_limit_stops_without_convergence() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root =
            push(&mut tree, &mut table, make_location("a.js", 2, 2), None);
        let child =
            push(&mut tree, &mut table, Attribution::Unknown, Some(root));
        let fixed_point = propagate_attributions(
            &mut tree,
            &mut table,
            &PropagationOptions { iteration_limit: 1 },
        );
        assert_eq!(
            fixed_point,
            FixedPoint {
                iterations: 1,
                converged: false
            }
        );
        // The state reached so far is kept.
        assert_eq!(
            attribution(&tree, &table, child),
            make_location("a.js", 2, 2)
        );
    }

    fn make_frames(url: &str, line: i64, column: i64) -> FrameInfoMap {
        let mut frames = FrameInfoMap::new();
        frames.insert(
            "F1".into(),
            FrameInfo {
                url: url.into(),
                function_name: None,
                line_number: line,
                column_number: column,
            },
        );
        frames
    }

    fn push_with_frame(
        tree: &mut TaskTree,
        table: &mut AttributionTable,
        attribution: Attribution,
    ) -> TaskId {
        let mut event = make_event("Task");
        event.args = serde_json::json!({"frame": "F1"});
        let id = tree.push(event, ms(0), ms(10), None);
        tree[id].metadata.attribution = table.intern(attribution);
        id
    }

    #[test]
    fn test_known_frame_upgrades_file_and_unknown() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let unknown =
            push_with_frame(&mut tree, &mut table, Attribution::Unknown);
        let file =
            push_with_frame(&mut tree, &mut table, Attribution::file("a.js"));
        let frames = make_frames("a.js", 4, 2);

        assert!(update_frame_attributions(&mut tree, &mut table, &frames));
        assert_eq!(
            attribution(&tree, &table, unknown),
            make_location("a.js", 4, 2)
        );
        assert_eq!(
            attribution(&tree, &table, file),
            make_location("a.js", 4, 2)
        );
        assert!(!update_frame_attributions(&mut tree, &mut table, &frames));
    }

    #[test]
    fn test_script_start_frame_only_upgrades_unknown() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let unknown =
            push_with_frame(&mut tree, &mut table, Attribution::Unknown);
        let file =
            push_with_frame(&mut tree, &mut table, Attribution::file("b.js"));
        let frames = make_frames("a.js", 1, 1);

        update_frame_attributions(&mut tree, &mut table, &frames);
        assert_eq!(
            attribution(&tree, &table, unknown),
            Attribution::file("a.js")
        );
        assert_eq!(
            attribution(&tree, &table, file),
            Attribution::file("b.js")
        );
    }

    #[test]
    fn test_outer_loop_reruns_after_frame_upgrade() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let id =
            push_with_frame(&mut tree, &mut table, Attribution::file("a.js"));
        let mut frames = make_frames("a.js", 4, 2);

        let fixed_point = propagate_and_infer(
            &mut tree,
            &mut table,
            &mut frames,
            &PropagationOptions::default(),
        );
        assert_eq!(
            fixed_point,
            FixedPoint {
                iterations: 2,
                converged: true
            }
        );
        assert_eq!(
            attribution(&tree, &table, id),
            make_location("a.js", 4, 2)
        );
    }

    #[test]
    fn test_outer_loop_reports_inner_limit() {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let root =
            push(&mut tree, &mut table, make_location("a.js", 2, 2), None);
        push(&mut tree, &mut table, Attribution::Unknown, Some(root));

        let fixed_point = propagate_and_infer(
            &mut tree,
            &mut table,
            &mut FrameInfoMap::new(),
            &PropagationOptions { iteration_limit: 1 },
        );
        assert_eq!(
            fixed_point,
            FixedPoint {
                iterations: 1,
                converged: false
            }
        );
    }

    /// Candidate attributions for generated trees.
    fn pool() -> Vec<Attribution> {
        vec![
            Attribution::Unknown,
            Attribution::file("a.js"),
            Attribution::file("b.js"),
            make_location("a.js", 1, 5),
            make_location("a.js", 2, 3),
            make_location("b.js", 4, 4),
        ]
    }

    /// Builds a forest from `(parent selector, attribution index)` pairs.
    fn make_random_tree(
        shape: &[(usize, usize)],
    ) -> (TaskTree, AttributionTable) {
        let mut tree = TaskTree::new();
        let mut table = AttributionTable::new();
        let pool = pool();
        for (i, &(parent, attr)) in shape.iter().enumerate() {
            let parent = (i > 0 && parent % 4 != 0)
                .then(|| TaskId((parent % i) as u64));
            push(&mut tree, &mut table, pool[attr].clone(), parent);
        }
        (tree, table)
    }

    fn specificities(
        tree: &TaskTree,
        table: &AttributionTable,
    ) -> Vec<Specificity> {
        tree.arena()
            .iter()
            .map(|node| table[node.metadata.attribution].specificity())
            .collect()
    }

    proptest! {
        #[test]
        fn test_specificity_never_decreases(
            shape in prop::collection::vec((0usize..100, 0usize..6), 1..40)
        ) {
            let (mut tree, mut table) = make_random_tree(&shape);
            let roots = tree.roots().to_vec();
            let mut previous = specificities(&tree, &table);
            for _ in 0..DEFAULT_ITERATION_LIMIT {
                propagate_by_scope(&mut tree, &mut table, &roots, None);
                let current = specificities(&tree, &table);
                for (before, after) in previous.iter().zip(&current) {
                    prop_assert!(after >= before);
                }
                propagate_by_sequence(&mut tree, &table, &roots);
                let next = specificities(&tree, &table);
                for (before, after) in current.iter().zip(&next) {
                    prop_assert!(after >= before);
                }
                previous = next;
            }
        }

        #[test]
        fn test_propagation_terminates(
            shape in prop::collection::vec((0usize..100, 0usize..6), 1..40)
        ) {
            // Each task changes at most twice, so 2n + 1 iterations always
            // suffice.
            let (mut tree, mut table) = make_random_tree(&shape);
            let options = PropagationOptions {
                iteration_limit: 2 * shape.len() + 1,
            };
            let fixed_point =
                propagate_attributions(&mut tree, &mut table, &options);
            prop_assert!(fixed_point.converged);
        }
    }
}
