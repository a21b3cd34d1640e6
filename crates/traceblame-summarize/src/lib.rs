//! Breakdowns, play-by-plays and summaries for attributed task trees.
//!
//! This is the last phase of the traceblame pipeline. Given a task tree
//! whose attributions and attribution roots are known, it:
//!
//! 1. [`compute_breakdowns`] splits every task's time into categories
//! 2. [`add_play_by_plays`] records what ran under every task, in order
//! 3. [`summarize`] ranks attributions by cumulative and longest time
//!
//! [`analyze`] runs the whole pipeline, from a parsed trace to a
//! [`Summary`]; [`run`] wraps it with JSON input and output.
//!
//! ## Usage
//!
//! ```no_run
//! use std::io::stdout;
//! use traceblame_summarize::{AnalysisOptions, run};
//!
//! let input = std::fs::File::open("trace.json").unwrap();
//! let mut out = stdout().lock();
//! run(input, &mut out, &AnalysisOptions::default(), &[]).unwrap();
//! ```

mod breakdowns;
mod error;
mod playbyplay;
mod summary;
#[cfg(test)]
mod testutil;

use std::io::{Read, Write};

use traceblame_attribute::{
    AttributionTable, Attributions, FixedPoint, PropagationOptions,
    SourceMapping, UrlFilter, apply_source_maps, filter_by_url_pattern,
    infer_attributions,
};
use traceblame_graph::{BuildOptions, TaskTree, build_task_tree, load_trace};
use traceblame_schemas::{Summary, Trace};
use tracing::{debug_span, info};

#[doc(inline)]
pub use crate::breakdowns::{BreakdownRollup, compute_breakdowns};
#[doc(inline)]
pub use crate::error::AnalyzeError;
use crate::error::AnalyzeErrorKind;
#[doc(inline)]
pub use crate::playbyplay::add_play_by_plays;
#[doc(inline)]
pub use crate::summary::{SummaryOptions, summarize};

/// Options for every phase of [`analyze`].
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub build: BuildOptions,
    pub propagation: PropagationOptions,
    /// Prune the tree to one script before measuring it.
    pub url_filter: Option<UrlFilter>,
    pub summary: SummaryOptions,
}

/// Everything an analysis run produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The task tree, with every pass's results in its metadata.
    pub tree: TaskTree,
    pub table: AttributionTable,
    pub fixed_point: FixedPoint,
    pub rollup: BreakdownRollup,
    pub summary: Summary,
}

/// Analyzes `trace` end to end.
///
/// Passes run in order: tree building, attribution inference, source-map
/// rewriting, URL filtering, breakdowns, play-by-plays, and finally the
/// summary. Source maps are applied before filtering so a filter can match
/// original file names.
///
/// # Errors
///
/// Returns [`AnalyzeError::is_no_main_thread`] when the trace has no task
/// events. Everything after tree building is infallible.
pub fn analyze(
    trace: &Trace,
    options: &AnalysisOptions,
    source_maps: &[SourceMapping],
) -> Result<Analysis, AnalyzeError> {
    let _span = debug_span!("analyze").entered();

    let mut tree = build_task_tree(trace, &options.build)?;
    let Attributions {
        mut table,
        fixed_point,
        ..
    } = infer_attributions(&mut tree, &options.propagation);
    apply_source_maps(&mut table, source_maps);
    if let Some(filter) = &options.url_filter {
        filter_by_url_pattern(&mut tree, &table, filter);
    }
    let rollup = compute_breakdowns(&mut tree);
    add_play_by_plays(&mut tree);
    let summary = summarize(&tree, &table, &options.summary);

    info!(
        tasks = tree.len(),
        attributions = table.len(),
        iterations = fixed_point.iterations,
        converged = fixed_point.converged,
        "analysis complete"
    );
    Ok(Analysis {
        tree,
        table,
        fixed_point,
        rollup,
        summary,
    })
}

/// Reads a trace from `input`, analyzes it, and writes the summary to
/// `output` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`AnalyzeError`] if:
/// - Reading from input fails ([`AnalyzeError::is_io`])
/// - The input is not a trace ([`AnalyzeError::is_deserialization`])
/// - The trace has no task events ([`AnalyzeError::is_no_main_thread`])
/// - Writing to output fails ([`AnalyzeError::is_io`])
/// - JSON serialization fails ([`AnalyzeError::is_serialization`])
pub fn run(
    input: impl Read,
    mut output: impl Write,
    options: &AnalysisOptions,
    source_maps: &[SourceMapping],
) -> Result<(), AnalyzeError> {
    let _span = debug_span!("run").entered();

    let trace = load_trace(input)?;
    let analysis = analyze(&trace, options, source_maps)?;
    serde_json::to_writer_pretty(&mut output, &analysis.summary).map_err(
        |e| AnalyzeError::new(AnalyzeErrorKind::Serialization(e)),
    )?;
    writeln!(output)?;

    Ok(())
}
