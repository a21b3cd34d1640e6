//! Arena-backed task tree.
//!
//! Nodes live in one `Vec` indexed by [`TaskId`]; children are owned id
//! lists and the parent link is a plain id. Pruning detaches subtrees from
//! their parent's child list (or from the root list) but leaves them in the
//! arena, so every traversal starts from [`TaskTree::roots`].

use std::ops::{Index, IndexMut};
use std::time::Duration;

use traceblame_schemas::{
    AttributionContext, AttributionId, Breakdown, BreakdownsByAttribution,
    PlayByPlayEntry, TaskGroup, TaskId, TraceEvent,
};
use tracing::warn;

/// Results the analysis passes attach to a task.
///
/// Filled in place, pass by pass; never replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMetadata {
    pub attribution: AttributionId,
    pub context: AttributionContext,
    /// Subtree breakdown: self time plus every descendant's breakdown.
    pub breakdown: Breakdown,
    /// Time spent under other attributions invoked from this task.
    pub breakdowns_by_attribution: BreakdownsByAttribution,
    pub play_by_play: Vec<PlayByPlayEntry>,
}

/// One unit of main-thread work.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub id: TaskId,
    /// The complete event, or the begin event of a begin/end pair.
    pub event: TraceEvent,
    pub parent: Option<TaskId>,
    pub children: Vec<TaskId>,
    pub start_time: Duration,
    pub end_time: Duration,
    pub duration: Duration,
    /// `duration` minus the children's durations, floored at zero.
    pub self_time: Duration,
    /// URLs the engine associates with this task and its ancestors.
    pub attributable_urls: Vec<String>,
    pub group: TaskGroup,
    pub metadata: TaskMetadata,
}

impl TaskNode {
    /// Creates a leaf node spanning `start_time..end_time`.
    pub fn new(
        id: TaskId,
        event: TraceEvent,
        start_time: Duration,
        end_time: Duration,
    ) -> Self {
        let group = TaskGroup::for_event_name(&event.name);
        let duration = end_time.saturating_sub(start_time);
        Self {
            id,
            event,
            parent: None,
            children: Vec::new(),
            start_time,
            end_time,
            duration,
            self_time: duration,
            attributable_urls: Vec::new(),
            group,
            metadata: TaskMetadata::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.event.name
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// A forest of tasks from one thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    roots: Vec<TaskId>,
}

impl TaskTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node, linking it under `parent` (or as a root).
    ///
    /// Returns the id of the new node, which is its arena index.
    pub fn push(
        &mut self,
        event: TraceEvent,
        start_time: Duration,
        end_time: Duration,
        parent: Option<TaskId>,
    ) -> TaskId {
        let id = TaskId(self.nodes.len() as u64);
        let mut node = TaskNode::new(id, event, start_time, end_time);
        node.parent = parent;
        node.metadata.context.is_top_level = parent.is_none();
        self.nodes.push(node);
        match parent {
            Some(p) => self[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Top-level tasks in start order.
    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        usize::try_from(id.0).ok().and_then(|i| self.nodes.get(i))
    }

    /// Every node ever created, including detached ones, in id order.
    pub fn arena(&self) -> &[TaskNode] {
        &self.nodes
    }

    /// Reachable task ids in pre-order (parents before children, siblings
    /// in start order).
    pub fn preorder(&self) -> Vec<TaskId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<TaskId> =
            self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self[id].children.iter().rev().copied());
        }
        order
    }

    /// Reachable task ids in post-order (children before parents).
    pub fn postorder(&self) -> Vec<TaskId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(TaskId, bool)> =
            self.roots.iter().rev().map(|&id| (id, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                let children = self[id].children.iter().rev();
                stack.extend(children.map(|&c| (c, false)));
            }
        }
        order
    }

    /// Reachable nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskNode> + '_ {
        self.preorder().into_iter().map(move |id| &self[id])
    }

    /// Number of reachable tasks.
    pub fn len(&self) -> usize {
        self.preorder().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(
        &self,
        id: TaskId,
    ) -> impl Iterator<Item = TaskId> + '_ {
        std::iter::successors(self[id].parent, move |&p| self[p].parent)
    }

    /// Replaces the child list of `parent` (or the root list when `None`).
    ///
    /// Only used for pruning: `kept` must be a subsequence of the current
    /// list.
    pub(crate) fn retain_children(
        &mut self,
        parent: Option<TaskId>,
        kept: Vec<TaskId>,
    ) {
        match parent {
            Some(p) => self[p].children = kept,
            None => self.roots = kept,
        }
    }

    /// Recomputes `self_time` for every reachable node.
    ///
    /// Logs a warning for each task whose children outlast it; self time is
    /// floored at zero in that case.
    pub fn compute_self_times(&mut self) {
        for id in self.postorder() {
            let children_total: Duration = self[id]
                .children
                .iter()
                .map(|&c| self[c].duration)
                .sum();
            let node = &mut self[id];
            if children_total > node.duration {
                warn!(
                    task_id = %id,
                    duration_us = node.duration.as_micros(),
                    children_us = children_total.as_micros(),
                    "children outlast their parent task; flooring self time"
                );
            }
            node.self_time = node.duration.saturating_sub(children_total);
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "task ids are arena indices"
)]
fn slot(id: TaskId) -> usize {
    id.0 as usize
}

impl Index<TaskId> for TaskTree {
    type Output = TaskNode;

    fn index(&self, id: TaskId) -> &TaskNode {
        &self.nodes[slot(id)]
    }
}

impl IndexMut<TaskId> for TaskTree {
    fn index_mut(&mut self, id: TaskId) -> &mut TaskNode {
        &mut self.nodes[slot(id)]
    }
}
