//! Fixtures for summary tests.

use std::time::Duration;

use serde_json::{Value, json};
use traceblame_schemas::{
    Attribution, DEVTOOLS_TIMELINE_CATEGORY, Phase, SourceLocation,
    TraceEvent,
};

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn make_event(name: &str) -> TraceEvent {
    TraceEvent::new(name, Phase::Complete, 0.0)
}

pub fn make_timeline_event(name: &str, data: Value) -> TraceEvent {
    TraceEvent {
        cat: DEVTOOLS_TIMELINE_CATEGORY.into(),
        args: json!({ "data": data }),
        ..make_event(name)
    }
}

pub fn make_location(url: &str, line: i64, column: i64) -> Attribution {
    Attribution::SourceLocation(SourceLocation::new(url, line, column))
}
