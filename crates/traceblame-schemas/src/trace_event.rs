//! Chrome trace event input schema.
//!
//! A trace is a flat list of [`TraceEvent`]s as written by the browser's
//! tracing backend. Events are immutable input: nothing in the pipeline
//! mutates them, and all structured access to the free-form `args` payload
//! goes through the read-only accessors on [`TraceEvent`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serde_duration;

/// The event category used by the renderer's timeline instrumentation.
pub const DEVTOOLS_TIMELINE_CATEGORY: &str = "devtools.timeline";

/// A complete trace, as read from disk.
///
/// Accepts both on-disk shapes: a bare JSON array of events, and the object
/// form `{"traceEvents": [...], ...}` where any other top-level keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TraceRepr")]
pub struct Trace {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<TraceEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceRepr {
    Array(Vec<TraceEvent>),
    Object {
        #[serde(rename = "traceEvents")]
        trace_events: Vec<TraceEvent>,
    },
}

impl From<TraceRepr> for Trace {
    fn from(repr: TraceRepr) -> Self {
        match repr {
            TraceRepr::Array(trace_events)
            | TraceRepr::Object { trace_events } => Trace { trace_events },
        }
    }
}

impl Trace {
    /// Wraps an event list.
    pub fn new(trace_events: Vec<TraceEvent>) -> Self {
        Self { trace_events }
    }

    /// Nominal end of the trace: the latest `ts + dur` over all events.
    ///
    /// Used to close begin events that never see a matching end.
    pub fn end_time(&self) -> Duration {
        self.trace_events
            .iter()
            .map(TraceEvent::end_time)
            .max()
            .unwrap_or_default()
    }
}

/// Event phase, the `ph` field.
///
/// Only [`Phase::DurationBegin`], [`Phase::DurationEnd`] and
/// [`Phase::Complete`] become tasks. Instant events feed the timer map and
/// metadata events name threads. Every other phase is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "B")]
    DurationBegin,
    #[serde(rename = "E")]
    DurationEnd,
    #[serde(rename = "X")]
    Complete,
    #[serde(rename = "i")]
    Instant,
    /// Deprecated spelling of [`Phase::Instant`], still emitted by Chrome.
    #[serde(rename = "I")]
    InstantDeprecated,
    #[serde(rename = "M")]
    Metadata,
    /// Counters, async, flow, sample and object events.
    #[serde(other)]
    Other,
}

impl Phase {
    /// Returns true for both instant spellings.
    pub fn is_instant(self) -> bool {
        matches!(self, Phase::Instant | Phase::InstantDeprecated)
    }
}

/// Identifies a thread within a process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub struct ThreadRef {
    pub pid: u64,
    pub tid: u64,
}

impl std::fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pid, self.tid)
    }
}

/// One record of the trace event log.
///
/// Timestamps are kept in the trace's native unit (f64 microseconds); use
/// [`TraceEvent::start_time`], [`TraceEvent::duration`] and
/// [`TraceEvent::end_time`] for `Duration` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(default)]
    pub cat: String,
    pub ph: Phase,
    #[serde(default)]
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: u64,
    #[serde(default)]
    pub tid: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

/// One frame of a JavaScript stack trace captured with an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub column_number: i64,
}

impl TraceEvent {
    /// Creates an event with the given name, phase and timestamp.
    ///
    /// Remaining fields are empty; tests and synthetic traces fill them in.
    pub fn new(name: impl Into<String>, ph: Phase, ts: f64) -> Self {
        Self {
            name: name.into(),
            cat: String::new(),
            ph,
            ts,
            dur: None,
            pid: 0,
            tid: 0,
            args: Value::Null,
        }
    }

    pub fn thread(&self) -> ThreadRef {
        ThreadRef {
            pid: self.pid,
            tid: self.tid,
        }
    }

    pub fn start_time(&self) -> Duration {
        serde_duration::from_micros_f64(self.ts)
    }

    /// Explicit duration of a complete event; zero for everything else.
    pub fn duration(&self) -> Duration {
        self.dur
            .map(serde_duration::from_micros_f64)
            .unwrap_or_default()
    }

    pub fn end_time(&self) -> Duration {
        self.start_time() + self.duration()
    }

    pub fn is_devtools_timeline(&self) -> bool {
        self.cat == DEVTOOLS_TIMELINE_CATEGORY
    }

    /// The `args.data` payload, if present.
    pub fn data(&self) -> Option<&Value> {
        self.args.get("data").filter(|v| v.is_object())
    }

    fn data_field(&self, key: &str) -> Option<&Value> {
        self.data().and_then(|d| d.get(key)).filter(|v| !v.is_null())
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data_field(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "line and column numbers are small integers"
    )]
    fn data_int(&self, key: &str) -> Option<i64> {
        let value = self.data_field(key)?;
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    /// Debugger frame id: `args.data.frame`, falling back to `args.frame`.
    pub fn frame(&self) -> Option<&str> {
        self.data_str("frame").or_else(|| {
            self.args
                .get("frame")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
    }

    /// Captured stack, innermost frame first.
    ///
    /// Reads `args.data.stackTrace`, falling back to
    /// `args.beginData.stackTrace`. Malformed frames are skipped.
    pub fn stack_trace(&self) -> Vec<CallFrame> {
        let stack = self.data_field("stackTrace").or_else(|| {
            self.args
                .get("beginData")
                .and_then(|b| b.get("stackTrace"))
                .filter(|v| !v.is_null())
        });
        stack
            .and_then(Value::as_array)
            .map(|frames| {
                frames
                    .iter()
                    .filter_map(|f| {
                        serde_json::from_value::<CallFrame>(f.clone()).ok()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Script URL from the data payload: `data.url`, then `data.fileName`.
    pub fn url(&self) -> Option<&str> {
        self.data_str("url").or_else(|| self.data_str("fileName"))
    }

    /// `data.url` only, without the `fileName` fallback.
    pub fn data_url(&self) -> Option<&str> {
        self.data_str("url")
    }

    /// `args.fileName`, used by module compilation events.
    pub fn file_name(&self) -> Option<&str> {
        self.args
            .get("fileName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn line_number(&self) -> Option<i64> {
        self.data_int("lineNumber")
    }

    pub fn column_number(&self) -> Option<i64> {
        self.data_int("columnNumber")
    }

    pub fn start_line(&self) -> Option<i64> {
        self.data_int("startLine")
    }

    pub fn function_name(&self) -> Option<&str> {
        self.data_str("functionName")
    }

    /// `data.type`, e.g. the DOM event type of an `EventDispatch`.
    pub fn event_type(&self) -> Option<&str> {
        self.data_str("type")
    }

    /// `data.timerId`, rendered as a string whether numeric or textual.
    pub fn timer_id(&self) -> Option<String> {
        match self.data_field("timerId")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `args.name` of a `thread_name` metadata event.
    pub fn thread_name(&self) -> Option<&str> {
        self.args.get("name").and_then(Value::as_str)
    }

    /// Human-readable label: the event name, suffixed with the timeline
    /// event type or URL when present.
    pub fn label(&self) -> String {
        match self.timeline_detail() {
            Some(detail) => format!("{} {detail}", self.name),
            None => self.name.clone(),
        }
    }

    /// `data.type` or `data.url` of a devtools timeline event.
    pub fn timeline_detail(&self) -> Option<&str> {
        if !self.is_devtools_timeline() {
            return None;
        }
        self.event_type().or_else(|| self.data_url())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn make_event(args: Value) -> TraceEvent {
        TraceEvent {
            args,
            ..TraceEvent::new("FunctionCall", Phase::Complete, 1_000.0)
        }
    }

    #[test]
    fn test_parses_array_and_object_forms() {
        let event =
            r#"{"name":"RunTask","ph":"X","ts":1,"dur":2,"pid":1,"tid":2}"#;
        let array = format!("[{event}]");
        let object = format!(r#"{{"traceEvents":[{event}],"metadata":{{}}}}"#);

        let a: Trace = serde_json::from_str(&array).unwrap();
        let b: Trace = serde_json::from_str(&object).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.trace_events.len(), 1);
        assert_eq!(a.trace_events[0].thread(), ThreadRef { pid: 1, tid: 2 });
    }

    #[test]
    fn test_unknown_phases_parse_as_other() {
        let event: TraceEvent =
            serde_json::from_value(json!({"name":"x","ph":"C","ts":0}))
                .unwrap();
        assert_eq!(event.ph, Phase::Other);
    }

    #[test]
    fn test_trace_end_is_latest_event_end() {
        let mut first = TraceEvent::new("a", Phase::Complete, 100.0);
        first.dur = Some(50.0);
        let second = TraceEvent::new("b", Phase::Instant, 120.0);
        let trace = Trace::new(vec![first, second]);
        assert_eq!(trace.end_time(), Duration::from_micros(150));
    }

    #[test]
    fn test_frame_prefers_data_over_args() {
        let event =
            make_event(json!({"frame": "outer", "data": {"frame": "inner"}}));
        assert_eq!(event.frame(), Some("inner"));

        let event = make_event(json!({"frame": "outer"}));
        assert_eq!(event.frame(), Some("outer"));
    }

    #[test]
    fn test_stack_trace_falls_back_to_begin_data() {
        let event = make_event(json!({
            "beginData": {"stackTrace": [
                {
                    "url": "app.js",
                    "lineNumber": 10,
                    "columnNumber": 5,
                    "functionName": "f"
                }
            ]}
        }));
        let stack = event.stack_trace();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].url, "app.js");
        assert_eq!(stack[0].line_number, 10);
        assert_eq!(stack[0].function_name.as_deref(), Some("f"));
    }

    #[test]
    fn test_url_falls_back_to_file_name() {
        let event = make_event(json!({"data": {"fileName": "lib.js"}}));
        assert_eq!(event.url(), Some("lib.js"));
        assert_eq!(event.data_url(), None);
    }

    #[test]
    fn test_timer_id_accepts_numbers_and_strings() {
        assert_eq!(
            make_event(json!({"data": {"timerId": 7}})).timer_id().as_deref(),
            Some("7")
        );
        assert_eq!(
            make_event(json!({"data": {"timerId": "t"}})).timer_id().as_deref(),
            Some("t")
        );
    }

    #[test]
    fn test_label_uses_timeline_detail() {
        let mut event = make_event(json!({"data": {"type": "click"}}));
        event.name = "EventDispatch".into();
        assert_eq!(event.label(), "EventDispatch");

        event.cat = DEVTOOLS_TIMELINE_CATEGORY.into();
        assert_eq!(event.label(), "EventDispatch click");
    }
}
