// src/location/source_span.rs
use crate::location::source_location::SourceLocation;
use std::fmt;
use std::sync::Arc;

/// A contiguous range of source text in one file. The start is inclusive,
/// the end exclusive. Spans are attached to tokens, AST nodes and
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceSpan {
    /// Path of the file this span points into (shared between all spans of
    /// a compilation).
    pub file_path: Arc<str>,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    #[must_use]
    pub fn new(file_path: Arc<str>, start: SourceLocation, end: SourceLocation) -> Self {
        Self { file_path, start, end }
    }

    /// Smallest span covering both `self` and `other`. Spans from different
    /// files do not merge; `other` is ignored in that case.
    #[must_use]
    pub fn merged(&self, other: &SourceSpan) -> SourceSpan {
        if self.file_path != other.file_path {
            return self.clone();
        }
        SourceSpan {
            file_path: self.file_path.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        SourceSpan { file_path: Arc::from(""), start: SourceLocation::default(), end: SourceLocation::default() }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}:{}",
            self.file_path, self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}
