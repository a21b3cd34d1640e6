//! Script URL matching and URL-based subtree filtering.

use traceblame_graph::{TaskFilterResult, TaskTree, filter_tasks};
use traceblame_schemas::{Attribution, AttributionContext};
use tracing::debug_span;

use crate::table::AttributionTable;

/// Returns true if the task described by `attribution` and `context` is
/// attributed to a script whose URL contains `pattern`.
///
/// With a `line`, only source locations can match, on either their current
/// or their pre-source-map position. Without one, file attributions and the
/// engine's attributable URLs match too.
pub fn is_attributed_to(
    attribution: &Attribution,
    context: &AttributionContext,
    pattern: &str,
    line: Option<i64>,
) -> bool {
    if let Attribution::SourceLocation(loc) = attribution {
        let at_line = |line_number: i64| line.is_none_or(|l| l == line_number);
        if loc.url.contains(pattern) && at_line(loc.line_number) {
            return true;
        }
        if let Some(generated) = &loc.generated
            && generated.url.contains(pattern)
            && at_line(generated.line_number)
        {
            return true;
        }
    }

    if line.is_some() {
        return false;
    }

    if let Attribution::File { url } = attribution
        && url.contains(pattern)
    {
        return true;
    }

    context
        .lighthouse_attributable_urls
        .iter()
        .any(|url| url.contains(pattern))
}

/// How much surrounding context a URL filter keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterKind {
    /// Matching tasks, their descendants and their ancestors.
    #[default]
    Fine,
    /// As `Fine`, plus the siblings of matching nested tasks.
    Coarse,
}

/// A URL filter request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlFilter {
    pub pattern: String,
    pub line: Option<i64>,
    pub kind: FilterKind,
}

/// Prunes `tree` to the tasks attributed to `filter.pattern`, with context
/// according to `filter.kind`. Attributions are left untouched.
///
/// Returns the number of tasks removed.
pub fn filter_by_url_pattern(
    tree: &mut TaskTree,
    table: &AttributionTable,
    filter: &UrlFilter,
) -> usize {
    let _span = debug_span!("filter_by_url_pattern", pattern = %filter.pattern)
        .entered();

    filter_tasks(tree, |node| {
        let metadata = &node.metadata;
        let matched = is_attributed_to(
            &table[metadata.attribution],
            &metadata.context,
            &filter.pattern,
            filter.line,
        );
        if !matched {
            return TaskFilterResult::drop_task();
        }
        TaskFilterResult {
            keep_task: true,
            keep_descendants: true,
            keep_siblings: filter.kind == FilterKind::Coarse
                && !node.is_top_level(),
            keep_sibling_descendants: false,
        }
    })
}

#[cfg(test)]
mod tests {
    use traceblame_graph::TaskNode;
    use traceblame_schemas::{FrameInfo, SourceLocation, TaskId};

    use super::*;
    use crate::testutil::{make_event, make_location, ms};

    fn context(urls: &[&str]) -> AttributionContext {
        AttributionContext {
            lighthouse_attributable_urls: urls
                .iter()
                .map(|&u| u.to_owned())
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_source_location_matches_url_and_line() {
        let loc = make_location("https://cdn/app.js", 10, 5);
        let ctx = context(&[]);
        assert!(is_attributed_to(&loc, &ctx, "app.js", None));
        assert!(is_attributed_to(&loc, &ctx, "app.js", Some(10)));
        assert!(!is_attributed_to(&loc, &ctx, "app.js", Some(11)));
        assert!(!is_attributed_to(&loc, &ctx, "vendor.js", None));
    }

    #[test]
    fn test_generated_position_matches() {
        let mut loc = SourceLocation::new("webpack:///src/main.ts", 3, 1);
        loc.generated = Some(FrameInfo {
            url: "https://cdn/bundle.js".into(),
            function_name: None,
            line_number: 1,
            column_number: 4000,
        });
        let attribution = Attribution::SourceLocation(loc);
        let ctx = context(&[]);
        assert!(is_attributed_to(&attribution, &ctx, "bundle.js", Some(1)));
        assert!(is_attributed_to(&attribution, &ctx, "main.ts", Some(3)));
        assert!(!is_attributed_to(&attribution, &ctx, "bundle.js", Some(3)));
    }

    #[test]
    fn test_line_excludes_files_and_context_urls() {
        let file = Attribution::file("app.js");
        let ctx = context(&["vendor.js"]);
        assert!(is_attributed_to(&file, &ctx, "app.js", None));
        assert!(!is_attributed_to(&file, &ctx, "app.js", Some(1)));
        assert!(is_attributed_to(&Attribution::Unknown, &ctx, "vendor", None));
        assert!(!is_attributed_to(
            &Attribution::Unknown,
            &ctx,
            "vendor",
            Some(1)
        ));
    }

    /// ```text
    /// 0 RunTask
    /// ├── 1 a        (app.js)
    /// │   └── 2 a1   (unknown)
    /// └── 3 b        (unknown)
    ///     └── 4 b1   (unknown)
    /// 5 RunTask      (unknown)
    /// ```
    fn make_tree(table: &mut AttributionTable) -> TaskTree {
        let app = table.intern(Attribution::file("app.js"));
        let mut tree = TaskTree::new();
        let root = tree.push(make_event("RunTask"), ms(0), ms(50), None);
        let a = tree.push(make_event("a"), ms(0), ms(10), Some(root));
        tree[a].metadata.attribution = app;
        tree.push(make_event("a1"), ms(0), ms(5), Some(a));
        let b = tree.push(make_event("b"), ms(10), ms(20), Some(root));
        tree.push(make_event("b1"), ms(10), ms(15), Some(b));
        tree.push(make_event("RunTask"), ms(60), ms(70), None);
        tree
    }

    fn names(tree: &TaskTree) -> Vec<&str> {
        tree.iter().map(TaskNode::name).collect()
    }

    #[test]
    fn test_fine_filter_keeps_match_with_ancestors_and_descendants() {
        let mut table = AttributionTable::new();
        let mut tree = make_tree(&mut table);
        let filter = UrlFilter {
            pattern: "app".into(),
            ..Default::default()
        };
        let removed = filter_by_url_pattern(&mut tree, &table, &filter);
        assert_eq!(names(&tree), vec!["RunTask", "a", "a1"]);
        assert_eq!(removed, 3);
    }

    #[test]
    fn test_coarse_filter_also_keeps_siblings() {
        let mut table = AttributionTable::new();
        let mut tree = make_tree(&mut table);
        let filter = UrlFilter {
            pattern: "app".into(),
            kind: FilterKind::Coarse,
            ..Default::default()
        };
        filter_by_url_pattern(&mut tree, &table, &filter);
        assert_eq!(names(&tree), vec!["RunTask", "a", "a1", "b"]);
        assert_eq!(tree.roots(), &[TaskId(0)]);
    }

    #[test]
    fn test_no_match_removes_everything() {
        let mut table = AttributionTable::new();
        let mut tree = make_tree(&mut table);
        let filter = UrlFilter {
            pattern: "nothing".into(),
            ..Default::default()
        };
        assert_eq!(filter_by_url_pattern(&mut tree, &table, &filter), 6);
        assert!(tree.is_empty());
    }
}
