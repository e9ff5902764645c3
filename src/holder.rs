use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::marker::TagLabel;

/// One tag boundary, recorded in the order the markers were replayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Open(TagLabel),
    Close(TagLabel),
}

/// Raw output and tag events that landed on a holder's last offset without the
/// input ending there; they belong to whatever text the next holder starts with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Residue {
    pub segment: Option<String>,
    pub tag_events: Vec<TagEvent>,
}

impl Residue {
    pub fn is_empty(&self) -> bool {
        self.segment.is_none() && self.tag_events.is_empty()
    }
}

/// Processed text and provenance for one raw chunk, before it is sliced into sentences.
///
/// `original_indexes` has exactly one entry per byte of `processed_text`, giving the
/// global original offset that byte came from. Sentence boundaries are inclusive
/// processed offsets; tag and raw-output maps are keyed by processed offset.
#[derive(Debug, Clone, Default)]
pub struct SentenceHolder {
    pub(crate) processed_text: String,
    pub(crate) original_indexes: Vec<usize>,
    pub(crate) sentence_boundaries: BTreeSet<usize>,
    /// A break fired before any text reached this holder: it ends the carried-over sentence
    pub(crate) closes_leftover: bool,
    pub(crate) newlines: BTreeMap<usize, usize>,
    pub(crate) tag_events: BTreeMap<usize, Vec<TagEvent>>,
    pub(crate) original_text_segments: BTreeMap<usize, String>,
    pub(crate) original_start_index: usize,
    pub(crate) end_of_block: bool,
    pub(crate) file: Option<PathBuf>,
    /// Processed offset up to which sentences have been extracted
    pub(crate) consumed: usize,
    output_divider: String,
}

impl SentenceHolder {
    pub fn new(original_start_index: usize, end_of_block: bool, output_divider: &str) -> Self {
        Self {
            original_start_index,
            end_of_block,
            output_divider: output_divider.to_string(),
            ..Self::default()
        }
    }

    /// Append raw text that starts at global original offset `original_start`
    pub(crate) fn append_raw(&mut self, raw: &str, original_start: usize) {
        self.processed_text.push_str(raw);
        self.original_indexes
            .extend(original_start..original_start + raw.len());
    }

    /// Append inserted text; every byte maps to the original position it stands in for
    pub(crate) fn append_inserted(&mut self, text: &str, original_position: usize) {
        self.processed_text.push_str(text);
        self.original_indexes
            .extend(std::iter::repeat(original_position).take(text.len()));
    }

    pub fn processed_text(&self) -> &str {
        &self.processed_text
    }

    pub fn len(&self) -> usize {
        self.processed_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed_text.is_empty()
    }

    pub fn original_indexes(&self) -> &[usize] {
        &self.original_indexes
    }

    /// Original offset of processed byte `index`; see [`crate::Sentence::original_index`]
    pub fn original_index(&self, index: usize) -> Option<usize> {
        if self.original_indexes.is_empty() {
            return Some(index);
        }
        if index < self.original_indexes.len() {
            Some(self.original_indexes[index])
        } else if index == self.original_indexes.len() {
            self.original_indexes.last().map(|last| last + 1)
        } else {
            None
        }
    }

    /// First processed index whose original offset is at or after `original`
    pub fn index_of(&self, original: usize) -> usize {
        self.original_indexes.partition_point(|&o| o < original)
    }

    pub fn sentence_boundaries(&self) -> &BTreeSet<usize> {
        &self.sentence_boundaries
    }

    /// Mark processed offset `boundary` as the last byte of a sentence
    pub fn add_sentence_boundary(&mut self, boundary: usize) {
        self.sentence_boundaries.insert(boundary);
    }

    pub fn closes_leftover(&self) -> bool {
        self.closes_leftover
    }

    pub(crate) fn add_newline(&mut self, original_offset: usize, line_number: usize) {
        self.newlines.insert(original_offset, line_number);
    }

    pub fn newlines(&self) -> &BTreeMap<usize, usize> {
        &self.newlines
    }

    pub fn line_number(&self, original: usize) -> Option<usize> {
        self.newlines.range(..=original).next_back().map(|(_, &line)| line)
    }

    pub fn column_number(&self, original: usize) -> Option<usize> {
        self.newlines
            .range(..=original)
            .next_back()
            .map(|(&start, _)| original - start)
    }

    /// Record raw text to echo at processed offset `position`; segments landing on the
    /// same offset are joined with the output divider
    pub(crate) fn add_original_text_segment(&mut self, position: usize, segment: String) {
        match self.original_text_segments.get_mut(&position) {
            Some(existing) => {
                existing.push_str(&self.output_divider);
                existing.push_str(&segment);
            }
            None => {
                self.original_text_segments.insert(position, segment);
            }
        }
    }

    pub fn original_text_segments(&self) -> &BTreeMap<usize, String> {
        &self.original_text_segments
    }

    pub(crate) fn add_tag_start(&mut self, position: usize, tag: TagLabel) {
        self.tag_events.entry(position).or_default().push(TagEvent::Open(tag));
    }

    pub(crate) fn add_tag_end(&mut self, position: usize, tag: TagLabel) {
        self.tag_events.entry(position).or_default().push(TagEvent::Close(tag));
    }

    pub fn tag_events(&self) -> &BTreeMap<usize, Vec<TagEvent>> {
        &self.tag_events
    }

    pub(crate) fn has_marks_at(&self, position: usize) -> bool {
        self.original_text_segments.contains_key(&position) || self.tag_events.contains_key(&position)
    }

    /// Remove the raw output and tag events recorded at processed offset `position`
    pub(crate) fn take_residue(&mut self, position: usize) -> Option<Residue> {
        let residue = Residue {
            segment: self.original_text_segments.remove(&position),
            tag_events: self.tag_events.remove(&position).unwrap_or_default(),
        };
        Some(residue).filter(|r| !r.is_empty())
    }

    /// Put a previous holder's residue in front of whatever this holder recorded at offset 0
    pub(crate) fn prepend_residue(&mut self, residue: Residue) {
        if let Some(mut segment) = residue.segment {
            if let Some(existing) = self.original_text_segments.remove(&0) {
                segment.push_str(&self.output_divider);
                segment.push_str(&existing);
            }
            self.original_text_segments.insert(0, segment);
        }
        if !residue.tag_events.is_empty() {
            let mut events = residue.tag_events;
            events.extend(self.tag_events.remove(&0).unwrap_or_default());
            self.tag_events.insert(0, events);
        }
    }

    /// Drop provenance maps once every offset has been handed to a sentence
    pub(crate) fn clear_marks(&mut self) {
        self.original_text_segments.clear();
        self.tag_events.clear();
    }

    pub fn original_start_index(&self) -> usize {
        self.original_start_index
    }

    /// True when no input followed this chunk, so trailing text is a complete sentence
    pub fn end_of_block(&self) -> bool {
        self.end_of_block
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub(crate) fn set_file(&mut self, file: Option<PathBuf>) {
        self.file = file;
    }

    pub fn output_divider(&self) -> &str {
        &self.output_divider
    }
}
