//! Structural subtree pruning.
//!
//! Filtering is mark then sweep. The predicate runs once per task; marked
//! tasks survive, unmarked subtrees are detached from their parent. Nothing
//! about the surviving nodes changes: durations, self times and metadata
//! are left as they were.

use std::collections::HashSet;

use traceblame_schemas::TaskId;
use tracing::{debug, debug_span, info};

use crate::tree::{TaskNode, TaskTree};

/// What a filter predicate wants kept around one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilterResult {
    /// Keep the task. Its ancestors are kept implicitly.
    pub keep_task: bool,
    /// Keep every descendant of the task.
    pub keep_descendants: bool,
    /// Keep every sibling of the task (but not their descendants).
    pub keep_siblings: bool,
    /// Keep every sibling of the task and all of their descendants.
    /// Implies `keep_siblings`.
    pub keep_sibling_descendants: bool,
}

impl TaskFilterResult {
    pub fn drop_task() -> Self {
        Self::default()
    }
}

/// Prunes `tree` to the tasks selected by `filter`.
///
/// Returns the number of reachable tasks removed.
pub fn filter_tasks(
    tree: &mut TaskTree,
    mut filter: impl FnMut(&TaskNode) -> TaskFilterResult,
) -> usize {
    let _span = debug_span!("filter_tasks").entered();

    let before = tree.preorder();
    let mut marks = HashSet::new();
    let roots = tree.roots().to_vec();
    mark_tasks(tree, &roots, &mut filter, false, &mut marks);

    let kept_roots: Vec<TaskId> =
        roots.into_iter().filter(|id| marks.contains(id)).collect();
    tree.retain_children(None, kept_roots);
    for &id in &before {
        if !marks.contains(&id) {
            continue;
        }
        let kept: Vec<TaskId> = tree[id]
            .children
            .iter()
            .copied()
            .filter(|child| marks.contains(child))
            .collect();
        tree.retain_children(Some(id), kept);
    }

    let removed = before.len() - tree.len();
    for id in before.iter().filter(|id| !marks.contains(id)) {
        debug!(task_id = %id, "filtered out task");
    }
    info!(removed, kept = before.len() - removed, "filtered task tree");
    removed
}

/// Marks the survivors among `siblings` and their subtrees.
///
/// Returns true if any task in the list was kept.
fn mark_tasks(
    tree: &TaskTree,
    siblings: &[TaskId],
    filter: &mut impl FnMut(&TaskNode) -> TaskFilterResult,
    kept_by_ancestor: bool,
    marks: &mut HashSet<TaskId>,
) -> bool {
    let results: Vec<TaskFilterResult> =
        siblings.iter().map(|&id| filter(&tree[id])).collect();
    let keep_sibling_descendants =
        results.iter().any(|r| r.keep_sibling_descendants);
    let keep_siblings =
        keep_sibling_descendants || results.iter().any(|r| r.keep_siblings);

    let mut kept_any = false;
    for (&id, result) in siblings.iter().zip(&results) {
        let keep_descendants = kept_by_ancestor
            || keep_sibling_descendants
            || result.keep_descendants;
        let kept_descendant = mark_tasks(
            tree,
            &tree[id].children,
            filter,
            keep_descendants,
            marks,
        );

        let keep = kept_by_ancestor
            || result.keep_task
            || kept_descendant
            || keep_siblings;
        if keep {
            marks.insert(id);
        }
        kept_any |= keep;
    }
    kept_any
}
