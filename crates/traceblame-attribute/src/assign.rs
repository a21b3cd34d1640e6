//! Initial attribution assignment.
//!
//! Each task gets the most precise attribution its own event supports,
//! using a fixed chain of heuristics; the first that applies wins. The walk
//! is top-down so each task sees the trigger and the attributable URLs of
//! its enclosing scope.

use std::collections::HashSet;

use traceblame_graph::{TaskNode, TaskTree};
use traceblame_schemas::{
    Attribution, AttributionId, FrameInfo, SourceLocation, TaskId,
};
use tracing::{debug, debug_span, info};

use crate::frames::FrameInfoMap;
use crate::table::AttributionTable;

/// Trigger of every top-level task.
pub const ROOT_TRIGGER: &str = "RunTask";

/// Events that start a new trigger regardless of their payload.
const TRIGGER_EVENTS: &[&str] = &["RunMicrotasks", "v8.compile"];

/// Assigns an initial attribution and context to every reachable task.
pub fn assign_attributions(
    tree: &mut TaskTree,
    table: &mut AttributionTable,
    frames: &FrameInfoMap,
) {
    let _span = debug_span!("assign_attributions").entered();

    let roots = tree.roots().to_vec();
    let mut pass = AssignPass {
        tree,
        table,
        frames,
    };
    pass.assign(&roots, ROOT_TRIGGER, &HashSet::new());

    let unknown = pass
        .tree
        .iter()
        .filter(|node| node.metadata.attribution == AttributionId::UNKNOWN)
        .count();
    info!(
        tasks = pass.tree.len(),
        unknown,
        attributions = pass.table.len(),
        "assigned attributions"
    );
}

struct AssignPass<'a> {
    tree: &'a mut TaskTree,
    table: &'a mut AttributionTable,
    frames: &'a FrameInfoMap,
}

impl AssignPass<'_> {
    fn assign(
        &mut self,
        ids: &[TaskId],
        scope_trigger: &str,
        scope_urls: &HashSet<String>,
    ) {
        for &id in ids {
            let node = &self.tree[id];
            let attribution =
                simplify(extract_attribution(node, self.frames, scope_urls));
            let subtree_trigger = subtree_trigger(node, scope_trigger);
            debug!(
                task_id = %id,
                attribution = %attribution,
                trigger = %subtree_trigger,
                "assigned attribution"
            );

            let mut subtree_urls = scope_urls.clone();
            subtree_urls.extend(node.attributable_urls.iter().cloned());
            let children = node.children.clone();

            let attribution = self.table.intern(attribution);
            let node = &mut self.tree[id];
            node.metadata.attribution = attribution;
            node.metadata.context.lighthouse_attributable_urls =
                node.attributable_urls.clone();
            node.metadata.context.triggers = vec![scope_trigger.to_owned()];

            self.assign(&children, &subtree_trigger, &subtree_urls);
        }
    }
}

/// Picks an attribution from the task's own event, first match wins:
///
/// 1. the innermost stack frame
/// 2. `data.url` (or `data.fileName`) with both line and column
/// 3. a frame id with a known position
/// 4. `data.url` (or `data.fileName`) alone
/// 5. `args.fileName`
/// 6. the only attributable URL
/// 7. the only attributable URL not already in scope
pub(crate) fn extract_attribution(
    node: &TaskNode,
    frames: &FrameInfoMap,
    scope_urls: &HashSet<String>,
) -> Attribution {
    let event = &node.event;

    if let Some(top) = event.stack_trace().into_iter().next() {
        return FrameInfo::from(top).into();
    }

    let url = event.url();
    if let Some(url) = url
        && let (Some(line), Some(column)) =
            (event.line_number(), event.column_number())
    {
        let mut location = SourceLocation::new(url, line, column);
        location.function_name = event.function_name().map(str::to_owned);
        return Attribution::SourceLocation(location);
    }

    if let Some(info) = event.frame().and_then(|f| frames.get(f)) {
        return info.clone().into();
    }

    if let Some(url) = url.or_else(|| event.file_name()) {
        return Attribution::file(url);
    }

    if let [url] = node.attributable_urls.as_slice() {
        return Attribution::file(url);
    }

    let mut new_urls = node
        .attributable_urls
        .iter()
        .filter(|url| !scope_urls.contains(*url));
    if let (Some(url), None) = (new_urls.next(), new_urls.next()) {
        return Attribution::file(url);
    }

    Attribution::Unknown
}

/// Line 1 column 1 is a script placeholder, not a position: demote it to
/// a file attribution so propagation may still find a real position.
pub(crate) fn simplify(attribution: Attribution) -> Attribution {
    match attribution {
        Attribution::SourceLocation(loc)
            if loc.line_number == 1 && loc.column_number == 1 =>
        {
            Attribution::File { url: loc.url }
        }
        other => other,
    }
}

/// Trigger inherited by the children of `node`.
///
/// Timeline events with a payload start a new trigger, labelled with their
/// type or url when they have one.
fn subtree_trigger(node: &TaskNode, scope_trigger: &str) -> String {
    let event = &node.event;
    if event.is_devtools_timeline() && event.data().is_some() {
        return event.label();
    }
    if TRIGGER_EVENTS.contains(&event.name.as_str()) {
        return event.name.clone();
    }
    scope_trigger.to_owned()
}
