//! Event fixtures for attribution tests.

use std::time::Duration;

use serde_json::{Value, json};
use traceblame_schemas::{
    Attribution, DEVTOOLS_TIMELINE_CATEGORY, Phase, SourceLocation,
    TraceEvent,
};

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// An event with no category and no payload.
pub fn make_event(name: &str) -> TraceEvent {
    TraceEvent::new(name, Phase::Complete, 0.0)
}

/// A devtools timeline event with the given `args.data` payload.
pub fn make_timeline_event(name: &str, data: Value) -> TraceEvent {
    TraceEvent {
        cat: DEVTOOLS_TIMELINE_CATEGORY.into(),
        args: json!({ "data": data }),
        ..make_event(name)
    }
}

/// An event whose innermost stack frame is `url:line:column`.
pub fn make_stack_event(
    name: &str,
    url: &str,
    line: i64,
    column: i64,
) -> TraceEvent {
    make_timeline_event(
        name,
        json!({
            "stackTrace": [{
                "url": url,
                "functionName": "",
                "lineNumber": line,
                "columnNumber": column,
            }],
        }),
    )
}

pub fn make_location(url: &str, line: i64, column: i64) -> Attribution {
    Attribution::SourceLocation(SourceLocation::new(url, line, column))
}
