//! Context handed to rules for a single file.

use crate::types::Location;
use std::path::Path;

/// Context provided to a rule's verification operation.
///
/// Carries the file contents and, when the rule asked for it and the file
/// parsed, the Rust syntax tree of the file.
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    /// Path of the file inside the virtual tree.
    pub path: &'a Path,
    /// File contents.
    pub content: &'a str,
    /// Parsed syntax tree, when available.
    pub syntax: Option<&'a syn::File>,
}

impl<'a> FileContext<'a> {
    /// Creates a context without a syntax tree.
    #[must_use]
    pub fn new(path: &'a Path, content: &'a str) -> Self {
        Self {
            path,
            content,
            syntax: None,
        }
    }

    /// Attaches a parsed syntax tree.
    #[must_use]
    pub fn with_syntax(mut self, syntax: Option<&'a syn::File>) -> Self {
        self.syntax = syntax;
        self
    }

    /// Returns the file extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&'a str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// Builds a location for a byte offset.
    #[must_use]
    pub fn location_at(&self, offset: usize) -> Location {
        location_at(self.content, offset)
    }

    /// Builds a location covering `len` bytes starting at `offset`.
    #[must_use]
    pub fn span_at(&self, offset: usize, len: usize) -> Location {
        location_at(self.content, offset).with_span(offset, len)
    }

    /// Calculates the byte offset for a 1-indexed line and column.
    #[must_use]
    pub fn offset_for(&self, line: usize, column: usize) -> usize {
        offset_for(self.content, line, column)
    }

    /// Iterates over lines with their 1-indexed number and starting byte offset.
    ///
    /// Line terminators (`\n` or `\r\n`) are stripped from the yielded text.
    pub fn lines(&self) -> impl Iterator<Item = (usize, usize, &'a str)> {
        let content = self.content;
        let mut offset = 0;
        content.split_inclusive('\n').enumerate().map(move |(i, raw)| {
            let start = offset;
            offset += raw.len();
            let text = raw
                .strip_suffix('\n')
                .map_or(raw, |t| t.strip_suffix('\r').unwrap_or(t));
            (i + 1, start, text)
        })
    }
}

/// Line and column (both 1-indexed, column in characters) of a byte offset.
///
/// Offsets past the end clamp to the end of the content.
#[must_use]
pub fn location_at(content: &str, offset: usize) -> Location {
    let mut offset = offset.min(content.len());
    while !content.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = content[line_start..offset].chars().count() + 1;
    Location::new(line, column)
}

/// Byte offset of a 1-indexed line and column, clamped to the content.
#[must_use]
pub fn offset_for(content: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, raw) in content.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let within: usize = raw
                .chars()
                .take(column.saturating_sub(1))
                .map(char::len_utf8)
                .sum();
            return offset + within;
        }
        offset += raw.len();
    }
    content.len()
}
