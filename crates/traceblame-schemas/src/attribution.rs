//! Attribution value types.
//!
//! An [`Attribution`] answers "which code caused this task". Attributions
//! are interned per analysis run: the table hands out an [`AttributionId`]
//! per distinct [`AttributionKey`], and every later comparison, grouping and
//! map lookup uses the id. Facts that belong to one task rather than to the
//! attribution itself live in [`AttributionContext`].

use serde::{Deserialize, Serialize};

use crate::CallFrame;

/// A script position recovered from a debugger frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInfo {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub line_number: i64,
    pub column_number: i64,
}

impl FrameInfo {
    /// Line 1, column 1 is what the engine reports when it only knows the
    /// script, not a position within it.
    pub fn is_script_start(&self) -> bool {
        self.line_number == 1 && self.column_number == 1
    }
}

impl From<CallFrame> for FrameInfo {
    fn from(frame: CallFrame) -> Self {
        Self {
            url: frame.url,
            function_name: frame.function_name.filter(|f| !f.is_empty()),
            line_number: frame.line_number,
            column_number: frame.column_number,
        }
    }
}

/// A precise script position, optionally rewritten through a source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Position before source-map rewriting, when a mapping was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<FrameInfo>,
    /// Lines of original source around the position, for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_lines: Option<Vec<String>>,
}

impl SourceLocation {
    pub fn new(
        url: impl Into<String>,
        line_number: i64,
        column_number: i64,
    ) -> Self {
        Self {
            url: url.into(),
            line_number,
            column_number,
            function_name: None,
            generated: None,
            source_lines: None,
        }
    }

    /// The current position as a [`FrameInfo`].
    pub fn frame(&self) -> FrameInfo {
        FrameInfo {
            url: self.url.clone(),
            function_name: self.function_name.clone(),
            line_number: self.line_number,
            column_number: self.column_number,
        }
    }
}

impl From<FrameInfo> for SourceLocation {
    fn from(frame: FrameInfo) -> Self {
        Self {
            url: frame.url,
            line_number: frame.line_number,
            column_number: frame.column_number,
            function_name: frame.function_name,
            generated: None,
            source_lines: None,
        }
    }
}

/// Where a task's time came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribution {
    Unknown,
    File { url: String },
    SourceLocation(SourceLocation),
}

impl Attribution {
    pub fn file(url: impl Into<String>) -> Self {
        Attribution::File { url: url.into() }
    }

    /// The interning key. Source locations are keyed on url, line and
    /// column only; function names and source-map data are not identity.
    pub fn key(&self) -> AttributionKey {
        match self {
            Attribution::Unknown => AttributionKey::Unknown,
            Attribution::File { url } => AttributionKey::File(url.clone()),
            Attribution::SourceLocation(loc) => {
                AttributionKey::SourceLocation {
                    url: loc.url.clone(),
                    line_number: loc.line_number,
                    column_number: loc.column_number,
                }
            }
        }
    }

    pub fn specificity(&self) -> Specificity {
        match self {
            Attribution::Unknown => Specificity::Unknown,
            Attribution::File { .. } => Specificity::File,
            Attribution::SourceLocation(_) => Specificity::SourceLocation,
        }
    }

    /// Script URL, for file and source-location attributions.
    pub fn url(&self) -> Option<&str> {
        match self {
            Attribution::Unknown => None,
            Attribution::File { url } => Some(url),
            Attribution::SourceLocation(loc) => Some(&loc.url),
        }
    }

    pub fn as_source_location(&self) -> Option<&SourceLocation> {
        match self {
            Attribution::SourceLocation(loc) => Some(loc),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Attribution::Unknown)
    }
}

impl From<FrameInfo> for Attribution {
    fn from(frame: FrameInfo) -> Self {
        Attribution::SourceLocation(frame.into())
    }
}

impl std::fmt::Display for Attribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attribution::Unknown => f.write_str("(unknown)"),
            Attribution::File { url } => f.write_str(url),
            Attribution::SourceLocation(loc) => {
                let (line, column) = (loc.line_number, loc.column_number);
                write!(f, "{}:{line}:{column}", loc.url)?;
                if let Some(name) = &loc.function_name {
                    write!(f, " ({name})")?;
                }
                Ok(())
            }
        }
    }
}

/// Identity of an [`Attribution`] for interning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributionKey {
    Unknown,
    File(String),
    SourceLocation {
        url: String,
        line_number: i64,
        column_number: i64,
    },
}

impl std::fmt::Display for AttributionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributionKey::Unknown => f.write_str("unknown"),
            AttributionKey::File(url) => write!(f, "file#{url}"),
            AttributionKey::SourceLocation {
                url,
                line_number,
                column_number,
            } => {
                write!(f, "sourceLocation#{url}#{column_number}#{line_number}")
            }
        }
    }
}

/// How much an attribution says, in increasing order.
///
/// Propagation only ever moves a task up this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    Unknown,
    File,
    SourceLocation,
}

/// Index of an interned [`Attribution`].
///
/// Ids are only meaningful within the table (or [`crate::Summary`]) that
/// issued them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AttributionId(pub usize);

impl AttributionId {
    /// Every table seeds `Unknown` first.
    pub const UNKNOWN: AttributionId = AttributionId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for AttributionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-task attribution facts that are not part of attribution identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionContext {
    /// The task has no parent.
    pub is_top_level: bool,
    /// No ancestor of the task shares its attribution.
    pub is_attribution_root: bool,
    /// URLs the engine's own instrumentation associates with the task.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lighthouse_attributable_urls: Vec<String>,
    /// What caused the task to run, e.g. `"TimerFire 12"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

impl AttributionContext {
    /// Unions `other`'s URLs and triggers into `self`, keeping first-seen
    /// order. The flags of `self` are left alone.
    pub fn merge(&mut self, other: &AttributionContext) {
        for url in &other.lighthouse_attributable_urls {
            if !self.lighthouse_attributable_urls.contains(url) {
                self.lighthouse_attributable_urls.push(url.clone());
            }
        }
        for trigger in &other.triggers {
            if !self.triggers.contains(trigger) {
                self.triggers.push(trigger.clone());
            }
        }
    }
}
