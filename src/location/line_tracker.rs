// src/location/line_tracker.rs
use crate::location::{source_location::SourceLocation, source_span::SourceSpan};
use std::sync::Arc;

/// Maps byte offsets to line/column positions. Line starts are precomputed
/// once so lookups are a binary search; the tracker also keeps the source
/// text around so diagnostics can show the offending line.
#[derive(Debug, Clone)]
pub struct LineTracker {
    source: Arc<str>,
    file_path: Arc<str>,
    /// Byte offset of the first character of each line. The first entry is
    /// always 0.
    line_starts: Vec<usize>,
}

impl LineTracker {
    pub fn new(file_path: &str, source: &str) -> Self {
        let line_starts =
            std::iter::once(0).chain(source.match_indices('\n').map(|(pos, _)| pos + 1)).collect();
        Self { source: Arc::from(source), file_path: Arc::from(file_path), line_starts }
    }

    /// Converts a byte offset into a 1-indexed line/column location.
    ///
    /// # Panics
    /// Panics if `offset` lies past the end of the source.
    #[must_use]
    pub fn location_for(&self, offset: usize) -> SourceLocation {
        assert!(
            offset <= self.source.len(),
            "offset {offset} out of bounds for source of length {}",
            self.source.len()
        );

        match self.line_starts.binary_search(&offset) {
            Ok(line) => SourceLocation::new(line + 1, 1, offset),
            Err(insertion) => {
                let line = insertion - 1;
                SourceLocation::new(line + 1, offset - self.line_starts[line] + 1, offset)
            }
        }
    }

    /// Builds a span for a byte range of the source.
    #[must_use]
    pub fn span_for(&self, range: std::ops::Range<usize>) -> SourceSpan {
        SourceSpan::new(self.file_path.clone(), self.location_for(range.start), self.location_for(range.end))
    }

    /// The text of a 1-indexed line, without its trailing newline.
    #[must_use]
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self.source[start..].find('\n').map_or(self.source.len(), |rel| start + rel);
        Some(&self.source[start..end])
    }
}
