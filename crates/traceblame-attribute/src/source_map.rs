//! Source-map rewriting of attributed positions.
//!
//! Resolving a generated position is delegated to a [`SourceMapResolver`];
//! this module only decides which attributions to rewrite and records the
//! position each one had before.

use traceblame_schemas::{Attribution, FrameInfo, SourceLocation};
use tracing::{debug, debug_span, info};

use crate::table::AttributionTable;

/// A position in original (pre-bundling) source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
    pub function_name: Option<String>,
}

/// Maps generated script positions back to original source.
pub trait SourceMapResolver {
    /// Resolves a generated position. Lines and columns are 1-based, as in
    /// trace events. Returns `None` when the map has no entry for it.
    fn resolve_original_position(
        &self,
        url: &str,
        line_number: i64,
        column_number: i64,
    ) -> Option<OriginalPosition>;

    /// Original source text around `position`, for display.
    fn source_lines(
        &self,
        _position: &OriginalPosition,
    ) -> Option<Vec<String>> {
        None
    }
}

/// A resolver, applied to source locations whose URL contains
/// `url_pattern`.
pub struct SourceMapping {
    pub url_pattern: String,
    pub resolver: Box<dyn SourceMapResolver>,
}

impl std::fmt::Debug for SourceMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceMapping")
            .field("url_pattern", &self.url_pattern)
            .finish_non_exhaustive()
    }
}

/// Lines shown around a resolved position: two before it, the line itself,
/// and two after.
///
/// `line_number` is 1-based. Out-of-range windows are clipped.
pub fn source_window(lines: &[String], line_number: i64) -> Vec<String> {
    let line = usize::try_from(line_number.saturating_sub(1)).unwrap_or(0);
    let start = line.saturating_sub(2).min(lines.len());
    let end = (line + 3).min(lines.len());
    lines[start..end].to_vec()
}

/// Rewrites interned source locations through `mappings`, in order.
///
/// Each attribution is rewritten at most once: the first mapping that
/// resolves it wins, and already-rewritten locations are skipped. A miss
/// leaves the attribution untouched. Ids are stable; the table key of a
/// rewritten location still names its generated position.
///
/// Returns the number of attributions rewritten.
pub fn apply_source_maps(
    table: &mut AttributionTable,
    mappings: &[SourceMapping],
) -> usize {
    let _span = debug_span!("apply_source_maps").entered();

    let mut rewritten = 0;
    for mapping in mappings {
        for id in table.ids() {
            let Some(Attribution::SourceLocation(loc)) = table.get_mut(id)
            else {
                continue;
            };
            let pattern = mapping.url_pattern.as_str();
            if loc.generated.is_some() || !loc.url.contains(pattern) {
                continue;
            }
            if rewrite(loc, mapping.resolver.as_ref()) {
                debug!(attribution = %id, url = %loc.url, "applied source map");
                rewritten += 1;
            }
        }
    }
    info!(rewritten, "applied source maps");
    rewritten
}

fn rewrite(loc: &mut SourceLocation, resolver: &dyn SourceMapResolver) -> bool {
    let Some(original) = resolver.resolve_original_position(
        &loc.url,
        loc.line_number,
        loc.column_number,
    ) else {
        debug!(
            url = %loc.url,
            line = loc.line_number,
            column = loc.column_number,
            "no source map entry for position"
        );
        return false;
    };

    loc.generated = Some(FrameInfo {
        url: std::mem::take(&mut loc.url),
        function_name: loc.function_name.clone(),
        line_number: loc.line_number,
        column_number: loc.column_number,
    });
    loc.source_lines = resolver.source_lines(&original);
    loc.url = original.url;
    loc.line_number = original.line_number;
    loc.column_number = original.column_number;
    if original.function_name.is_some() {
        loc.function_name = original.function_name;
    }
    true
}
