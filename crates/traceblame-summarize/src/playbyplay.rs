//! Play-by-plays: what each task did, in order.
//!
//! A task's play-by-play lists the task itself and then every descendant in
//! pre-order, each with its self time only. Adjacent entries with the same
//! attribution and the same kind of work are merged so long loops read as
//! one line.

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use traceblame_graph::TaskTree;
use traceblame_schemas::{Breakdown, PlayByPlayEntry, TaskId};
use tracing::{debug_span, info};

/// Coarse kind of work, used only to decide which entries may merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Event,
    Gc,
    Network,
    Rendering,
    Script,
    Task,
    Other,
}

impl Category {
    /// Classifies an entry by the first word of its name.
    fn of(name: &str) -> Self {
        let event = name.split(' ').next().unwrap_or(name);
        match event {
            "EventDispatch" => Category::Event,
            "MajorGC" | "MinorGC" | "V8.GCFinalizeMC" => Category::Gc,
            "XHRReadyStateChange" | "XHRLoad" => Category::Network,
            "ParseHTML" | "UpdateLayoutTree" => Category::Rendering,
            "EvaluateScript"
            | "FunctionCall"
            | "RunMicrotasks"
            | "v8.callFunction"
            | "v8.compile"
            | "V8.DeoptimizeCode"
            | "V8.Execute"
            | "V8.HandleInterrupts"
            | "v8.newInstance"
            | "V8.RunMicrotasks"
            | "v8.run"
            | "V8.ScriptCompiler"
            | "V8.StackGuard" => Category::Script,
            "ScheduledAction::execute" | "TimerFire" => Category::Task,
            _ => Category::Other,
        }
    }
}

/// Fills `metadata.play_by_play` for every task in `tree`.
///
/// Entry breakdowns hold self time as left over by the breakdown pass, so
/// run after [`compute_breakdowns`](crate::compute_breakdowns).
pub fn add_play_by_plays(tree: &mut TaskTree) {
    let _span = debug_span!("add_play_by_plays").entered();

    // Unmerged lists of tasks whose parent has not been visited yet.
    let mut pending: HashMap<TaskId, Vec<PlayByPlayEntry>> = HashMap::new();
    let mut tasks = 0;
    let mut entries = 0;
    for id in tree.postorder() {
        let node = &tree[id];
        let children: Breakdown = node
            .children
            .iter()
            .map(|&c| &tree[c].metadata.breakdown)
            .sum();
        let self_time =
            node.metadata.breakdown.total().saturating_sub(children.total());

        let mut play_by_play = vec![PlayByPlayEntry {
            name: node.event.label(),
            attribution: node.metadata.attribution,
            breakdown: Breakdown::from_self_time(node.group, self_time),
            task_ids: vec![id],
        }];
        for child in &node.children {
            if let Some(child_entries) = pending.remove(child) {
                play_by_play.extend(child_entries);
            }
        }

        let simplified = simplify(play_by_play.clone());
        tasks += 1;
        entries += simplified.len();
        tree[id].metadata.play_by_play = simplified;
        pending.insert(id, play_by_play);
    }
    info!(tasks, entries, "added play-by-plays");
}

/// Merges adjacent runs of entries that share an attribution and a
/// category.
fn simplify(entries: Vec<PlayByPlayEntry>) -> Vec<PlayByPlayEntry> {
    if entries.len() < 2 {
        return entries;
    }
    let runs = entries
        .into_iter()
        .chunk_by(|e| (e.attribution, Category::of(&e.name)));
    let mut merged = Vec::new();
    for (_, run) in &runs {
        merged.push(merge_run(run.collect()));
    }
    merged
}

fn merge_run(run: Vec<PlayByPlayEntry>) -> PlayByPlayEntry {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for entry in &run {
        *counts.entry(entry.name.as_str()).or_default() += 1;
    }
    let name = counts
        .iter()
        .map(|(name, &count)| match count {
            1 => (*name).to_owned(),
            n => format!("{name} (x{n})"),
        })
        .join(", ");

    PlayByPlayEntry {
        name,
        attribution: run[0].attribution,
        breakdown: run.iter().map(|e| &e.breakdown).sum(),
        task_ids: run
            .iter()
            .flat_map(|e| e.task_ids.iter().copied())
            .collect(),
    }
}
