//! Error types for the traceblame-graph crate.

use std::backtrace::Backtrace;
use std::fmt;

/// Error type for loading a trace and building its task tree.
///
/// Malformed-but-usable input (unbalanced end events, children that
/// outlast their parent) is logged and tolerated; this type only covers
/// conditions that leave nothing to analyze.
#[derive(Debug)]
pub struct GraphError {
    kind: GraphErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum GraphErrorKind {
    /// The input is not a trace in array or object form.
    Deserialization(serde_json::Error),
    /// I/O error when reading the trace.
    Io(std::io::Error),
    /// No thread carries any task events.
    NoMainThread,
}

impl GraphError {
    pub(crate) fn new(kind: GraphErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if the input could not be parsed as a trace.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, GraphErrorKind::Deserialization(_))
    }

    /// Returns true if reading the input failed.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, GraphErrorKind::Io(_))
    }

    /// Returns true if the trace has no thread with task events.
    pub fn is_no_main_thread(&self) -> bool {
        matches!(self.kind, GraphErrorKind::NoMainThread)
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphErrorKind::Deserialization(err) => {
                write!(f, "failed to parse trace: {err}")
            }
            GraphErrorKind::Io(err) => write!(f, "I/O error: {err}"),
            GraphErrorKind::NoMainThread => {
                f.write_str("trace contains no task events on any thread")
            }
        }
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;

        // Empty unless RUST_BACKTRACE is set.
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            GraphErrorKind::Deserialization(err) => Some(err),
            GraphErrorKind::Io(err) => Some(err),
            GraphErrorKind::NoMainThread => None,
        }
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        Self::new(GraphErrorKind::Io(err))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(GraphErrorKind::Deserialization(err))
    }
}
