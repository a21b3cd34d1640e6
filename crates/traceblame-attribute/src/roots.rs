//! Attribution roots: the topmost task of each same-attribution region.

use traceblame_graph::TaskTree;
use traceblame_schemas::{AttributionId, TaskId};
use tracing::{debug, debug_span, info};

/// Marks every task with no ancestor sharing its attribution as an
/// attribution root, and clears the mark everywhere else.
///
/// Returns the number of roots.
pub fn find_attribution_roots(tree: &mut TaskTree) -> usize {
    let _span = debug_span!("find_attribution_roots").entered();

    let roots = tree.roots().to_vec();
    let mut ancestors = Vec::new();
    let count = mark_roots(tree, &roots, &mut ancestors);
    info!(roots = count, "found attribution roots");
    count
}

fn mark_roots(
    tree: &mut TaskTree,
    ids: &[TaskId],
    ancestors: &mut Vec<AttributionId>,
) -> usize {
    let mut count = 0;
    for &id in ids {
        let attribution = tree[id].metadata.attribution;
        let is_root = !ancestors.contains(&attribution);
        if is_root {
            debug!(task_id = %id, %attribution, "attribution root");
            count += 1;
        }
        tree[id].metadata.context.is_attribution_root = is_root;

        let children = tree[id].children.clone();
        ancestors.push(attribution);
        count += mark_roots(tree, &children, ancestors);
        ancestors.pop();
    }
    count
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testutil::{make_event, ms};

    fn push(
        tree: &mut TaskTree,
        attribution: usize,
        parent: Option<TaskId>,
    ) -> TaskId {
        let id = tree.push(make_event("Task"), ms(0), ms(10), parent);
        tree[id].metadata.attribution = AttributionId(attribution);
        id
    }

    fn is_root(tree: &TaskTree, id: TaskId) -> bool {
        tree[id].metadata.context.is_attribution_root
    }

    #[test]
    fn test_nested_repeat_is_not_a_root() {
        let mut tree = TaskTree::new();
        let root = push(&mut tree, 0, None);
        let a = push(&mut tree, 1, Some(root));
        let inner = push(&mut tree, 2, Some(a));
        let repeat = push(&mut tree, 1, Some(inner));
        let sibling = push(&mut tree, 1, Some(root));

        assert_eq!(find_attribution_roots(&mut tree), 4);
        assert!(is_root(&tree, root));
        assert!(is_root(&tree, a));
        assert!(is_root(&tree, inner));
        assert!(!is_root(&tree, repeat));
        // Siblings are not ancestors.
        assert!(is_root(&tree, sibling));
    }

    #[test]
    fn test_rerun_clears_stale_marks() {
        let mut tree = TaskTree::new();
        let root = push(&mut tree, 1, None);
        let child = push(&mut tree, 2, Some(root));
        find_attribution_roots(&mut tree);
        assert!(is_root(&tree, child));

        tree[child].metadata.attribution = AttributionId(1);
        find_attribution_roots(&mut tree);
        assert!(!is_root(&tree, child));
    }

    proptest! {
        /// A task is a root exactly when no ancestor shares its
        /// attribution, so no task sits under two roots of one attribution.
        #[test]
        fn test_roots_are_exclusive(
            shape in prop::collection::vec((0usize..100, 0usize..4), 1..40)
        ) {
            let mut tree = TaskTree::new();
            for (i, &(parent, attribution)) in shape.iter().enumerate() {
                let parent = (i > 0 && parent % 4 != 0)
                    .then(|| TaskId((parent % i) as u64));
                push(&mut tree, attribution, parent);
            }
            find_attribution_roots(&mut tree);

            for node in tree.iter() {
                let attribution = node.metadata.attribution;
                let shared = tree
                    .ancestors(node.id)
                    .filter(|&a| tree[a].metadata.attribution == attribution)
                    .count();
                prop_assert_eq!(
                    node.metadata.context.is_attribution_root,
                    shared == 0
                );
            }
        }
    }
}
