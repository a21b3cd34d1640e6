//! Frame inference: debugger frame id to script position.
//!
//! Some events carry only a frame id, while others on the same frame also
//! carry the script url and line. Collecting the latter lets the former be
//! attributed precisely.

use indexmap::IndexMap;
use traceblame_graph::{TaskNode, TaskTree};
use traceblame_schemas::FrameInfo;
use tracing::{debug, debug_span};

/// Known frame positions, keyed by frame id, in discovery order.
pub type FrameInfoMap = IndexMap<String, FrameInfo>;

/// Records a [`FrameInfo`] for every frame id not yet in `frames`.
///
/// An event qualifies when it names a frame, has `data.url`, and has a line
/// (`data.lineNumber`, else `data.startLine`). Existing entries are never
/// updated, so rerunning over an unchanged tree is a no-op.
///
/// Returns the number of entries added.
pub fn infer_frame_source_locations(
    tree: &TaskTree,
    frames: &mut FrameInfoMap,
) -> usize {
    let _span = debug_span!("infer_frame_source_locations").entered();

    let before = frames.len();
    for node in tree.iter() {
        let Some(frame) = node.event.frame() else {
            continue;
        };
        if frames.contains_key(frame) {
            continue;
        }
        if let Some(info) = frame_info(node) {
            debug!(
                task_id = %node.id,
                frame,
                url = %info.url,
                "inferred frame location"
            );
            frames.insert(frame.to_owned(), info);
        }
    }
    frames.len() - before
}

fn frame_info(node: &TaskNode) -> Option<FrameInfo> {
    let event = &node.event;
    let url = event.data_url()?;
    let line_number = event.line_number().or_else(|| event.start_line())?;
    Some(FrameInfo {
        url: url.to_owned(),
        function_name: event.function_name().map(str::to_owned),
        line_number,
        column_number: event.column_number().unwrap_or(0),
    })
}
