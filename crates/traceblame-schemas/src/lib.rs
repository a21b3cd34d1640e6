//! Schema definitions shared by every traceblame phase.
//!
//! This crate holds the data that flows between the pipeline phases:
//!
//! - **Input**: [`Trace`] and [`TraceEvent`], the flat Chrome trace event log
//! - **Classification**: [`TaskGroup`] and the per-category [`Breakdown`]
//! - **Attribution**: interned [`Attribution`] values referenced by
//!   [`AttributionId`], plus the per-task [`AttributionContext`]
//! - **Output**: the [`Summary`] report and its [`AttributionStatistics`]
//!
//! Durations are `std::time::Duration` internally so that self-time and
//! breakdown arithmetic is exact. At the JSON boundary they are written as
//! f64 milliseconds (see [`serde_duration`]).

mod attribution;
mod breakdown;
pub mod serde_duration;
mod summary;
mod task_group;
#[cfg(test)]
mod testutil;
mod trace_event;

#[doc(inline)]
pub use attribution::*;
#[doc(inline)]
pub use breakdown::*;
#[doc(inline)]
pub use summary::*;
#[doc(inline)]
pub use task_group::*;
#[doc(inline)]
pub use trace_event::*;
