use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::marker::AttributeValue;

/// A tagged span of sentence text, in sentence byte offsets `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub attribute: String,
    pub value: AttributeValue,
    pub start: usize,
    pub end: usize,
}

/// A finished unit of processed text with its provenance.
///
/// Byte `i` of [`Sentence::text`] came from byte `original_index(i)` of the
/// original input (inserted text maps to the position it replaced). Line and
/// column lookups take original offsets, so `line_number(original_index(i))`
/// gives the line of the `i`-th byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub(crate) text: String,
    pub(crate) original_indexes: Vec<usize>,
    pub(crate) original_text_segments: BTreeMap<usize, String>,
    pub(crate) newlines: BTreeMap<usize, usize>,
    pub(crate) tags: Vec<Tag>,
    /// Indexes into `tags` still waiting for their end; only non-empty while incomplete
    pub(crate) open_tags: Vec<usize>,
    pub(crate) complete: bool,
    pub(crate) file: Option<PathBuf>,
    pub(crate) leftover_original_text: String,
}

impl Sentence {
    /// Incomplete sentence with no text, used to hold raw output no sentence claimed
    pub(crate) fn empty(file: Option<PathBuf>) -> Self {
        Self {
            text: String::new(),
            original_indexes: Vec::new(),
            original_text_segments: BTreeMap::new(),
            newlines: BTreeMap::new(),
            tags: Vec::new(),
            open_tags: Vec::new(),
            complete: false,
            file,
            leftover_original_text: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Original offset of processed byte `index`.
    /// One past the end maps to one past the last original byte; beyond that is `None`.
    pub fn original_index(&self, index: usize) -> Option<usize> {
        if self.original_indexes.is_empty() {
            return Some(index);
        }
        match index.cmp(&self.original_indexes.len()) {
            std::cmp::Ordering::Less => Some(self.original_indexes[index]),
            std::cmp::Ordering::Equal => self.original_indexes.last().map(|last| last + 1),
            std::cmp::Ordering::Greater => None,
        }
    }

    pub fn original_indexes(&self) -> &[usize] {
        &self.original_indexes
    }

    /// First processed index whose original offset is at or after `original`;
    /// `len()` if every byte comes from before it
    pub fn index_of(&self, original: usize) -> usize {
        self.original_indexes.partition_point(|&o| o < original)
    }

    pub fn original_start(&self) -> Option<usize> {
        self.original_indexes.first().copied()
    }

    pub fn original_end(&self) -> Option<usize> {
        self.original_indexes.last().map(|last| last + 1)
    }

    /// 1-based line containing an original offset, `None` if no line start is known
    pub fn line_number(&self, original: usize) -> Option<usize> {
        self.newlines
            .range(..=original)
            .next_back()
            .map(|(_, &line)| line)
    }

    /// 0-based column of an original offset
    pub fn column_number(&self, original: usize) -> Option<usize> {
        self.newlines
            .range(..=original)
            .next_back()
            .map(|(&line_start, _)| original - line_start)
    }

    /// Original offset of each line start in and just before this sentence
    pub fn newlines(&self) -> &BTreeMap<usize, usize> {
        &self.newlines
    }

    /// Raw text excluded from analysis that should be echoed just before processed byte `index`;
    /// at `len()` it follows the last byte
    pub fn preceding_raw_segment(&self, index: usize) -> Option<&str> {
        self.original_text_segments.get(&index).map(String::as_str)
    }

    pub fn original_text_segments(&self) -> &BTreeMap<usize, String> {
        &self.original_text_segments
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Raw output from a region still open when the input ended
    pub fn leftover_original_text(&self) -> Option<&str> {
        Some(self.leftover_original_text.as_str()).filter(|s| !s.is_empty())
    }

    pub(crate) fn append_leftover_original_text(&mut self, text: &str, divider: &str) {
        if !self.leftover_original_text.is_empty() {
            self.leftover_original_text.push_str(divider);
        }
        self.leftover_original_text.push_str(text);
    }

    /// True when there is nothing to hand to a consumer: no text and no raw output
    pub(crate) fn carries_nothing(&self) -> bool {
        self.text.is_empty()
            && self.original_text_segments.is_empty()
            && self.leftover_original_text.is_empty()
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(text: &str, original_indexes: Vec<usize>) -> Sentence {
        let mut s = Sentence::empty(None);
        s.text = text.to_string();
        s.original_indexes = original_indexes;
        s.newlines = BTreeMap::from([(0, 1), (10, 2)]);
        s.complete = true;
        s
    }

    #[test]
    fn test_original_index_edges() {
        let s = sentence("abc", vec![4, 5, 9]);
        assert_eq!(s.original_index(0), Some(4));
        assert_eq!(s.original_index(2), Some(9));
        assert_eq!(s.original_index(3), Some(10));
        assert_eq!(s.original_index(4), None);

        let empty = sentence("", vec![]);
        assert_eq!(empty.original_index(7), Some(7));
    }

    #[test]
    fn test_index_of_finds_first_at_or_after() {
        let s = sentence("abc", vec![4, 5, 9]);
        assert_eq!(s.index_of(0), 0);
        assert_eq!(s.index_of(5), 1);
        assert_eq!(s.index_of(6), 2);
        assert_eq!(s.index_of(10), 3);
    }

    #[test]
    fn test_line_and_column_lookup() {
        let s = sentence("abc", vec![4, 5, 12]);
        assert_eq!(s.line_number(4), Some(1));
        assert_eq!(s.column_number(4), Some(4));
        assert_eq!(s.line_number(12), Some(2));
        assert_eq!(s.column_number(12), Some(2));

        let mut no_lines = sentence("a", vec![0]);
        no_lines.newlines.clear();
        assert_eq!(no_lines.line_number(0), None);
        assert_eq!(no_lines.column_number(0), None);
    }
}
