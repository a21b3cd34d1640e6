//! Task categories.

use serde::{Deserialize, Serialize};

/// Coarse category of main-thread work, derived from the event name.
///
/// The set is closed: every event name maps to exactly one group, with
/// unrecognized names landing in [`TaskGroup::Other`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum TaskGroup {
    #[serde(rename = "parseHTML")]
    ParseHtml,
    StyleLayout,
    PaintCompositeRender,
    ScriptParseCompile,
    ScriptEvaluation,
    GarbageCollection,
    Other,
}

impl TaskGroup {
    /// Every group, in breakdown field order.
    pub const ALL: [TaskGroup; 7] = [
        TaskGroup::ParseHtml,
        TaskGroup::StyleLayout,
        TaskGroup::PaintCompositeRender,
        TaskGroup::ScriptParseCompile,
        TaskGroup::ScriptEvaluation,
        TaskGroup::GarbageCollection,
        TaskGroup::Other,
    ];

    /// Classifies a trace event by name.
    pub fn for_event_name(name: &str) -> TaskGroup {
        match name {
            "ParseHTML" | "ParseAuthorStyleSheet" => TaskGroup::ParseHtml,

            "ScheduleStyleRecalculation"
            | "RecalculateStyles"
            | "UpdateLayoutTree"
            | "InvalidateLayout"
            | "Layout" => TaskGroup::StyleLayout,

            "Animation"
            | "RequestMainThreadFrame"
            | "ActivateLayerTree"
            | "DrawFrame"
            | "HitTest"
            | "PaintSetup"
            | "Paint"
            | "PaintImage"
            | "Rasterize"
            | "RasterTask"
            | "ScrollLayer"
            | "UpdateLayer"
            | "UpdateLayerTree"
            | "CompositeLayers"
            | "PrePaint" => TaskGroup::PaintCompositeRender,

            "v8.compile" | "v8.compileModule" | "v8.parseOnBackground" => {
                TaskGroup::ScriptParseCompile
            }

            "EventDispatch"
            | "EvaluateScript"
            | "v8.evaluateModule"
            | "FunctionCall"
            | "TimerFire"
            | "FireIdleCallback"
            | "FireAnimationFrame"
            | "RunMicrotasks"
            | "V8.Execute" => TaskGroup::ScriptEvaluation,

            "GCEvent"
            | "MinorGC"
            | "MajorGC"
            | "ThreadState::performIdleLazySweep"
            | "ThreadState::completeSweep"
            | "BlinkGCMarking" => TaskGroup::GarbageCollection,

            _ => TaskGroup::Other,
        }
    }

    /// The camelCase identifier used in JSON output.
    pub fn id(self) -> &'static str {
        match self {
            TaskGroup::ParseHtml => "parseHTML",
            TaskGroup::StyleLayout => "styleLayout",
            TaskGroup::PaintCompositeRender => "paintCompositeRender",
            TaskGroup::ScriptParseCompile => "scriptParseCompile",
            TaskGroup::ScriptEvaluation => "scriptEvaluation",
            TaskGroup::GarbageCollection => "garbageCollection",
            TaskGroup::Other => "other",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            TaskGroup::ParseHtml => "Parse HTML & CSS",
            TaskGroup::StyleLayout => "Style & Layout",
            TaskGroup::PaintCompositeRender => "Rendering",
            TaskGroup::ScriptParseCompile => "Script Parsing & Compilation",
            TaskGroup::ScriptEvaluation => "Script Evaluation",
            TaskGroup::GarbageCollection => "Garbage Collection",
            TaskGroup::Other => "Other",
        }
    }
}

impl std::fmt::Display for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
