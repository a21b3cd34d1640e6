//! Trace fixtures for graph tests. Times are whole milliseconds.

use std::time::Duration;

use traceblame_schemas::{Phase, Trace, TraceEvent};

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn make_event(name: &str, ph: Phase, ts_ms: u64) -> TraceEvent {
    #[expect(clippy::cast_precision_loss, reason = "test timestamps are small")]
    let ts = (ts_ms * 1_000) as f64;
    TraceEvent {
        cat: "devtools.timeline".into(),
        pid: 1,
        tid: 1,
        ..TraceEvent::new(name, ph, ts)
    }
}

pub fn make_complete(name: &str, ts_ms: u64, dur_ms: u64) -> TraceEvent {
    #[expect(clippy::cast_precision_loss, reason = "test durations are small")]
    let dur = (dur_ms * 1_000) as f64;
    TraceEvent {
        dur: Some(dur),
        ..make_event(name, Phase::Complete, ts_ms)
    }
}

pub fn make_begin(name: &str, ts_ms: u64) -> TraceEvent {
    make_event(name, Phase::DurationBegin, ts_ms)
}

pub fn make_end(name: &str, ts_ms: u64) -> TraceEvent {
    make_event(name, Phase::DurationEnd, ts_ms)
}

pub fn make_instant(name: &str, ts_ms: u64) -> TraceEvent {
    make_event(name, Phase::Instant, ts_ms)
}

pub fn make_trace(events: Vec<TraceEvent>) -> Trace {
    Trace::new(events)
}
