//! Task tree construction from a flat trace event log.
//!
//! Main-thread events are replayed in timestamp order against a stack of
//! open frames. Complete (`X`) events carry their own end and are closed
//! implicitly once a later event starts at or after it; begin (`B`) events
//! stay open until the matching end (`E`) event. Nodes are created in start
//! order, so task ids come out in pre-order.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use traceblame_schemas::{Phase, TaskId, ThreadRef, Trace, TraceEvent};
use tracing::{debug, debug_span, info, warn};

use crate::error::{GraphError, GraphErrorKind};
use crate::tree::TaskTree;

/// Thread name the renderer gives its main thread.
const RENDERER_MAIN_THREAD: &str = "CrRendererMain";

const THREAD_NAME_EVENT: &str = "thread_name";
const TIMER_INSTALL_EVENT: &str = "TimerInstall";
const TIMER_FIRE_EVENT: &str = "TimerFire";

/// Options for [`build_task_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Analyze this thread instead of detecting the main thread.
    pub main_thread: Option<ThreadRef>,
}

/// A frame on the open-task stack.
struct OpenFrame {
    id: TaskId,
    /// Known end of a complete event; `None` while a begin awaits its end.
    end: Option<Duration>,
}

/// Builds the main-thread task tree for `trace`.
///
/// # Errors
///
/// Returns [`GraphError::is_no_main_thread`] when no thread carries task
/// events and no thread was chosen explicitly.
pub fn build_task_tree(
    trace: &Trace,
    options: &BuildOptions,
) -> Result<TaskTree, GraphError> {
    let _span = debug_span!("build_task_tree").entered();

    let thread = select_main_thread(trace, options)?;
    let trace_end = trace.end_time();

    let mut events: Vec<&TraceEvent> = trace
        .trace_events
        .iter()
        .filter(|e| e.thread() == thread)
        .filter(|e| {
            matches!(
                e.ph,
                Phase::DurationBegin | Phase::DurationEnd | Phase::Complete
            ) || (e.ph.is_instant() && e.name == TIMER_INSTALL_EVENT)
        })
        .collect();
    events.sort_by_key(|e| replay_order(e));

    let mut tree = TaskTree::new();
    let mut stack: Vec<OpenFrame> = Vec::new();
    let mut timers: HashMap<String, TaskId> = HashMap::new();

    for event in events {
        let ts = event.start_time();

        // Close complete events that ended before this one starts.
        while let Some(top) = stack.last()
            && top.end.is_some_and(|end| end <= ts)
        {
            stack.pop();
        }

        let parent = stack.last().map(|f| f.id);
        match event.ph {
            Phase::Complete => {
                let end = event.end_time();
                let id = tree.push(event.clone(), ts, end, parent);
                stack.push(OpenFrame { id, end: Some(end) });
            }
            Phase::DurationBegin => {
                // Provisional end; replaced when the end event arrives.
                let end = trace_end.max(ts);
                let id = tree.push(event.clone(), ts, end, parent);
                stack.push(OpenFrame { id, end: None });
            }
            Phase::DurationEnd => close_begin(&mut tree, &mut stack, event),
            _ => {
                if let (Some(timer_id), Some(installer)) =
                    (event.timer_id(), parent)
                {
                    timers.insert(timer_id, installer);
                }
            }
        }
    }

    let unclosed = stack.iter().filter(|f| f.end.is_none()).count();
    if unclosed > 0 {
        debug!(unclosed, "begin events left open run to the end of the trace");
    }

    compute_attributable_urls(&mut tree, &timers);
    tree.compute_self_times();

    info!(
        thread = %thread,
        tasks = tree.len(),
        top_level = tree.roots().len(),
        "built task tree"
    );
    Ok(tree)
}

/// Picks the thread to analyze.
///
/// An explicit choice wins. Otherwise the busiest `CrRendererMain` thread,
/// falling back to the busiest thread overall. Busyness is the number of
/// begin and complete events; ties go to the lowest pid/tid.
fn select_main_thread(
    trace: &Trace,
    options: &BuildOptions,
) -> Result<ThreadRef, GraphError> {
    if let Some(thread) = options.main_thread {
        debug!(thread = %thread, "using explicitly selected thread");
        return Ok(thread);
    }

    let mut task_counts: HashMap<ThreadRef, usize> = HashMap::new();
    let mut renderer_main: HashSet<ThreadRef> = HashSet::new();
    for event in &trace.trace_events {
        match event.ph {
            Phase::Complete | Phase::DurationBegin => {
                *task_counts.entry(event.thread()).or_default() += 1;
            }
            Phase::Metadata
                if event.name == THREAD_NAME_EVENT
                    && event.thread_name() == Some(RENDERER_MAIN_THREAD) =>
            {
                renderer_main.insert(event.thread());
            }
            _ => {}
        }
    }

    let busiest = |renderer_only: bool| {
        task_counts
            .iter()
            .filter(|(thread, _)| {
                !renderer_only || renderer_main.contains(*thread)
            })
            .max_by_key(|&(thread, &count)| (count, Reverse(*thread)))
            .map(|(thread, _)| *thread)
    };

    let thread = busiest(true)
        .or_else(|| busiest(false))
        .ok_or_else(|| GraphError::new(GraphErrorKind::NoMainThread))?;
    debug!(
        thread = %thread,
        renderer_main = renderer_main.contains(&thread),
        "selected main thread"
    );
    Ok(thread)
}

/// Sort key for replaying events; used with a stable sort.
///
/// At equal timestamps, begin and end events come first and keep their
/// trace order, so a zero-length begin/end pair closes before anything
/// else opens. Complete events follow, longest first so that enclosing
/// tasks are opened before the tasks they contain, then instants.
fn replay_order(event: &TraceEvent) -> (Duration, u8, Reverse<Duration>) {
    let (rank, span) = match event.ph {
        Phase::DurationBegin | Phase::DurationEnd => (0, Duration::MAX),
        Phase::Complete => (1, event.duration()),
        _ => (2, Duration::ZERO),
    };
    (event.start_time(), rank, Reverse(span))
}

/// Closes the innermost open begin matching `event`'s name.
///
/// Open frames above the match are closed at the same time. Begin frames
/// among them were never ended, which means the trace nests them wrongly;
/// that is logged. An end event with no matching begin is ignored.
fn close_begin(
    tree: &mut TaskTree,
    stack: &mut Vec<OpenFrame>,
    event: &TraceEvent,
) {
    let ts = event.start_time();
    let is_match = |frame: &OpenFrame| {
        let name = &tree[frame.id].event.name;
        frame.end.is_none() && (event.name.is_empty() || *name == event.name)
    };
    let Some(pos) = stack.iter().rposition(is_match) else {
        warn!(
            name = %event.name,
            ts_us = ts.as_micros(),
            "end event without a matching begin; ignoring"
        );
        return;
    };

    for frame in stack.drain(pos + 1..) {
        if frame.end.is_none() {
            warn!(
                task_id = %frame.id,
                name = %tree[frame.id].event.name,
                closed_by = %event.name,
                "begin event closed by an enclosing end event"
            );
            set_end_time(tree, frame.id, ts);
        }
    }
    if let Some(frame) = stack.pop() {
        set_end_time(tree, frame.id, ts);
    }
}

fn set_end_time(tree: &mut TaskTree, id: TaskId, end: Duration) {
    let node = &mut tree[id];
    node.end_time = end.max(node.start_time);
    node.duration = node.end_time - node.start_time;
}

/// Fills in each task's engine-attributable URLs: the parent's URLs
/// followed by the task's own, duplicates dropped.
///
/// Script compilation and evaluation events contribute their script URL;
/// every event contributes its stack frame URLs; a timer firing contributes
/// the URLs of the task that installed the timer.
fn compute_attributable_urls(
    tree: &mut TaskTree,
    timers: &HashMap<String, TaskId>,
) {
    for id in tree.preorder() {
        let mut urls = tree[id]
            .parent
            .map(|p| tree[p].attributable_urls.clone())
            .unwrap_or_default();
        for url in own_attributable_urls(tree, id, timers) {
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
        tree[id].attributable_urls = urls;
    }
}

fn own_attributable_urls(
    tree: &TaskTree,
    id: TaskId,
    timers: &HashMap<String, TaskId>,
) -> Vec<String> {
    let event = &tree[id].event;
    let stack_urls = event.stack_trace().into_iter().map(|frame| frame.url);
    match event.name.as_str() {
        "v8.compile" | "EvaluateScript" | "FunctionCall" => event
            .data_url()
            .map(str::to_owned)
            .into_iter()
            .chain(stack_urls)
            .collect(),
        "v8.compileModule" => event
            .file_name()
            .map(str::to_owned)
            .into_iter()
            .chain(stack_urls)
            .collect(),
        TIMER_FIRE_EVENT => event
            .timer_id()
            .and_then(|timer_id| timers.get(&timer_id))
            .map(|&installer| tree[installer].attributable_urls.clone())
            .unwrap_or_default(),
        _ => stack_urls.collect(),
    }
}
