//! Byte offset to line/column mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A location span in source text.
///
/// Lines and columns are 0-indexed; columns count Unicode scalar values.
/// `Display` renders them 1-indexed for humans.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl SourceSpan {
    #[must_use]
    pub const fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Whether `other` lies entirely within this span.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        (self.start_line, self.start_col) <= (other.start_line, other.start_col)
            && (other.end_line, other.end_col) <= (self.end_line, self.end_col)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(
                f,
                "{}:{}-{}",
                self.start_line + 1,
                self.start_col + 1,
                self.end_col + 1
            )
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start_line + 1,
                self.start_col + 1,
                self.end_line + 1,
                self.end_col + 1
            )
        }
    }
}

/// Index of line start offsets for a document.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(newline_starts(text));
        Self { line_starts }
    }

    /// Map a byte offset to `(line, column)`.
    #[must_use]
    pub fn position(&self, text: &str, offset: usize) -> (usize, usize) {
        let offset = floor_char_boundary(text, offset.min(text.len()));
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let col = text[self.line_starts[line]..offset].chars().count();
        (line, col)
    }

    /// Map a byte range to a span.
    #[must_use]
    pub fn span(&self, text: &str, start: usize, end: usize) -> SourceSpan {
        let (start_line, start_col) = self.position(text, start);
        let (end_line, end_col) = self.position(text, end.max(start));
        SourceSpan::new(start_line, start_col, end_line, end_col)
    }
}

fn newline_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'\n')
        .map(|(idx, _)| idx + 1)
}

fn floor_char_boundary(text: &str, mut offset: usize) -> usize {
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
