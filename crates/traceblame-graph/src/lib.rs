//! Trace loading and task tree construction.
//!
//! This crate turns the flat event list of a Chrome trace into a forest of
//! main-thread tasks. It is the first phase of the traceblame pipeline:
//!
//! 1. [`load_trace`] parses the trace JSON (array or object form)
//! 2. [`build_task_tree`] picks the main thread and nests its events by
//!    time containment, computing self times and attributable URLs
//! 3. [`filter_tasks`] prunes subtrees with a caller-supplied predicate
//!
//! ## Usage
//!
//! ```no_run
//! use traceblame_graph::{BuildOptions, build_task_tree, load_trace};
//!
//! let file = std::fs::File::open("trace.json").unwrap();
//! let trace = load_trace(file).unwrap();
//! let tree = build_task_tree(&trace, &BuildOptions::default()).unwrap();
//! println!("{} tasks", tree.len());
//! ```

mod builder;
mod error;
mod filter;
#[cfg(test)]
mod testutil;
mod tree;

use std::io::Read;

use traceblame_schemas::Trace;
use tracing::{debug, debug_span};

#[doc(inline)]
pub use crate::builder::{BuildOptions, build_task_tree};
#[doc(inline)]
pub use crate::error::GraphError;
#[doc(inline)]
pub use crate::filter::{TaskFilterResult, filter_tasks};
#[doc(inline)]
pub use crate::tree::{TaskMetadata, TaskNode, TaskTree};

/// Reads a whole trace from `input`.
///
/// # Errors
///
/// Returns [`GraphError`] if:
/// - Reading from input fails ([`GraphError::is_io`])
/// - The input is neither an event array nor an object with
///   `traceEvents` ([`GraphError::is_deserialization`])
pub fn load_trace(mut input: impl Read) -> Result<Trace, GraphError> {
    let _span = debug_span!("load_trace").entered();

    let mut json = String::new();
    input.read_to_string(&mut json)?;
    let trace: Trace = serde_json::from_str(&json)?;
    debug!(events = trace.trace_events.len(), "parsed trace");
    Ok(trace)
}
