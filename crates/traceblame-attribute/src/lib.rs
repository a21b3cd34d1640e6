//! Attribution inference for task trees.
//!
//! This crate answers "which code caused this task" for every task in a
//! [`TaskTree`]. It is the second phase of the traceblame pipeline:
//!
//! 1. [`infer_frame_source_locations`] learns frame id positions
//! 2. [`assign_attributions`] gives each task an initial attribution from
//!    its own event
//! 3. [`propagate_and_infer`] refines attributions from parents, children
//!    and siblings until nothing changes
//! 4. [`find_attribution_roots`] marks the topmost task of each
//!    same-attribution region
//!
//! [`infer_attributions`] runs all four. Attributions are interned in an
//! [`AttributionTable`]; tasks refer to them by [`AttributionId`].
//!
//! Optional follow-up passes rewrite positions through source maps
//! ([`apply_source_maps`]) and prune the tree to one script
//! ([`filter_by_url_pattern`]).
//!
//! [`AttributionId`]: traceblame_schemas::AttributionId

mod assign;
mod frames;
mod matching;
mod propagate;
mod roots;
mod source_map;
mod table;
#[cfg(test)]
mod testutil;

use traceblame_graph::TaskTree;
use tracing::debug_span;

#[doc(inline)]
pub use crate::assign::{ROOT_TRIGGER, assign_attributions};
#[doc(inline)]
pub use crate::frames::{FrameInfoMap, infer_frame_source_locations};
#[doc(inline)]
pub use crate::matching::{
    FilterKind, UrlFilter, filter_by_url_pattern, is_attributed_to,
};
#[doc(inline)]
pub use crate::propagate::{
    DEFAULT_ITERATION_LIMIT, FixedPoint, PropagationOptions,
    propagate_and_infer, propagate_attributions, refine,
};
#[doc(inline)]
pub use crate::roots::find_attribution_roots;
#[doc(inline)]
pub use crate::source_map::{
    OriginalPosition, SourceMapResolver, SourceMapping, apply_source_maps,
    source_window,
};
#[doc(inline)]
pub use crate::table::AttributionTable;

/// State produced by [`infer_attributions`].
#[derive(Debug, Clone)]
pub struct Attributions {
    pub table: AttributionTable,
    pub frames: FrameInfoMap,
    /// How the outer propagate/re-infer loop ended.
    pub fixed_point: FixedPoint,
}

/// Runs every attribution pass over `tree`, in order.
///
/// Never fails: ambiguity resolves to the unknown attribution, and hitting
/// the iteration limit is logged and keeps the last state.
pub fn infer_attributions(
    tree: &mut TaskTree,
    options: &PropagationOptions,
) -> Attributions {
    let _span = debug_span!("infer_attributions").entered();

    let mut table = AttributionTable::new();
    let mut frames = FrameInfoMap::new();
    infer_frame_source_locations(tree, &mut frames);
    assign_attributions(tree, &mut table, &frames);
    let fixed_point =
        propagate_and_infer(tree, &mut table, &mut frames, options);
    find_attribution_roots(tree);

    Attributions {
        table,
        frames,
        fixed_point,
    }
}
