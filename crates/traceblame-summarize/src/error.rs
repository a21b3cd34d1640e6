//! Error types for the traceblame-summarize crate.

use std::backtrace::Backtrace;
use std::fmt;

use traceblame_graph::GraphError;

/// Error type for a whole analysis run.
#[derive(Debug)]
pub struct AnalyzeError {
    kind: AnalyzeErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum AnalyzeErrorKind {
    /// Loading the trace or building its task tree failed.
    Graph(GraphError),
    /// Failed to serialize the summary to JSON.
    Serialization(serde_json::Error),
    /// I/O error when writing output.
    Io(std::io::Error),
}

impl AnalyzeError {
    pub(crate) fn new(kind: AnalyzeErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if the trace could not be loaded or had no tasks.
    pub fn is_graph(&self) -> bool {
        matches!(self.kind, AnalyzeErrorKind::Graph(_))
    }

    /// Returns true if the trace was not valid trace JSON.
    pub fn is_deserialization(&self) -> bool {
        matches!(
            &self.kind,
            AnalyzeErrorKind::Graph(e) if e.is_deserialization()
        )
    }

    /// Returns true if the trace has no thread with task events.
    pub fn is_no_main_thread(&self) -> bool {
        matches!(
            &self.kind,
            AnalyzeErrorKind::Graph(e) if e.is_no_main_thread()
        )
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, AnalyzeErrorKind::Serialization(_))
    }

    /// Returns true if reading input or writing output failed.
    pub fn is_io(&self) -> bool {
        match &self.kind {
            AnalyzeErrorKind::Io(_) => true,
            AnalyzeErrorKind::Graph(e) => e.is_io(),
            AnalyzeErrorKind::Serialization(_) => false,
        }
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for AnalyzeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzeErrorKind::Graph(err) => write!(f, "{err}"),
            AnalyzeErrorKind::Serialization(err) => {
                write!(f, "failed to serialize summary: {err}")
            }
            AnalyzeErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Graph errors already print their own backtrace.
        if let AnalyzeErrorKind::Graph(err) = &self.kind {
            return write!(f, "{err}");
        }
        writeln!(f, "{}", self.kind)?;
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for AnalyzeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AnalyzeErrorKind::Graph(err) => Some(err),
            AnalyzeErrorKind::Serialization(err) => Some(err),
            AnalyzeErrorKind::Io(err) => Some(err),
        }
    }
}

impl From<GraphError> for AnalyzeError {
    fn from(err: GraphError) -> Self {
        Self::new(AnalyzeErrorKind::Graph(err))
    }
}

impl From<std::io::Error> for AnalyzeError {
    fn from(err: std::io::Error) -> Self {
        Self::new(AnalyzeErrorKind::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn make_graph_error() -> GraphError {
        let json_err =
            serde_json::from_str::<String>("not valid json").unwrap_err();
        GraphError::from(json_err)
    }

    #[test]
    fn test_graph_error_is_classified_through() {
        let err = AnalyzeError::from(make_graph_error());

        assert!(err.is_graph());
        assert!(err.is_deserialization());
        assert!(!err.is_no_main_thread());
        assert!(!err.is_io());
        assert!(!err.is_serialization());
        assert!(err.to_string().contains("failed to parse trace"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_serialization() {
        let json_err =
            serde_json::from_str::<String>("not valid json").unwrap_err();
        let err = AnalyzeError::new(AnalyzeErrorKind::Serialization(json_err));

        assert!(err.is_serialization());
        assert!(!err.is_graph());
        assert!(err.to_string().contains("failed to serialize summary"));
    }

    #[test]
    fn test_io_from() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err = AnalyzeError::from(io_err);

        assert!(err.is_io());
        assert!(!err.is_graph());
        assert!(err.to_string().contains("I/O error"));
        let _ = err.backtrace();
    }
}
