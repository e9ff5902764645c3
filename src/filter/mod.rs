// WHY: filters only ever see raw text plus context and hand back plain values
// (markers or annotations); merging them into the rolling window is the caller's job

pub mod descriptor;

use regex_automata::meta::Regex;
use tracing::{info, trace};

use crate::error::{RawTextError, Result};
use crate::marker::{sort_markers, Direction, FilterId, FilterType, Marker, TagLabel};

pub use descriptor::{parse_descriptor, parse_descriptors};

/// Raw text to annotate, with left and right context.
/// Matching runs over `prev + text + next`; only `text` is analysed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBlock<'a> {
    pub prev: &'a str,
    pub text: &'a str,
    pub next: &'a str,
}

impl<'a> RawBlock<'a> {
    pub fn new(prev: &'a str, text: &'a str, next: &'a str) -> Self {
        Self { prev, text, next }
    }

    fn haystack(&self) -> String {
        let mut haystack =
            String::with_capacity(self.prev.len() + self.text.len() + self.next.len());
        haystack.push_str(self.prev);
        haystack.push_str(self.text);
        haystack.push_str(self.next);
        haystack
    }

    fn text_range(&self) -> (usize, usize) {
        let start = self.prev.len();
        (start, start + self.text.len())
    }

    /// Whether an end position (haystack coordinates) belongs to this block.
    /// An end exactly at the end of `text` is only reported once there is no more
    /// input to come; otherwise the next block reports it at position 0.
    fn owns_end(&self, end: usize) -> bool {
        let (start, stop) = self.text_range();
        end >= start && (end < stop || (end == stop && !self.text.is_empty() && self.next.is_empty()))
    }
}

/// One regex match, positions in haystack coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    pub start: usize,
    pub end: usize,
    pub match_text: String,
    pub insertion_text: Option<String>,
}

/// A filter match tagged with one filter type, positioned relative to the
/// analysed text. Carried by the rolling window until its end has been replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub filter_type: FilterType,
    pub source: FilterId,
    pub match_text: String,
    pub insertion_text: Option<String>,
    pub tag: Option<TagLabel>,
}

impl Annotation {
    /// Markers this annotation contributes at one of its ends
    pub fn markers(&self, direction: Direction, position: usize) -> impl Iterator<Item = Marker> + '_ {
        self.filter_type
            .markers(direction)
            .iter()
            .map(move |&kind| Marker {
                kind,
                direction,
                position,
                source: self.source,
                match_text: self.match_text.clone(),
                insertion_text: self.insertion_text.clone(),
                tag: self.tag.clone(),
            })
    }

    pub fn shift(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// Scans raw text for a pattern and turns matches into region markers
#[derive(Debug, Clone)]
pub struct RegexFilter {
    id: FilterId,
    name: String,
    filter_types: Vec<FilterType>,
    pattern: String,
    regex: Regex,
    group_index: usize,
    replacement: Option<String>,
    tag: Option<TagLabel>,
    block_size: usize,
}

impl RegexFilter {
    pub fn new(
        id: FilterId,
        filter_types: Vec<FilterType>,
        pattern: &str,
        block_size: usize,
    ) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| RawTextError::InvalidRegex {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;
        info!(%id, pattern, types = ?filter_types, "Compiled regex filter");
        Ok(Self {
            id,
            name: "RegexMarkerFilter".to_string(),
            filter_types,
            pattern: pattern.to_string(),
            regex,
            group_index: 0,
            replacement: None,
            tag: None,
            block_size,
        })
    }

    /// Use a capture group rather than the whole match as the marked span
    pub fn with_group(mut self, group_index: usize) -> Result<Self> {
        let available = self.regex.captures_len();
        if group_index >= available {
            return Err(RawTextError::InvalidGroupIndex {
                group: group_index,
                available,
            });
        }
        self.group_index = group_index;
        Ok(self)
    }

    /// Replacement with `$1`/`${name}` interpolation, used by REPLACE
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    pub fn with_tag(mut self, tag: TagLabel) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter_types(&self) -> &[FilterType] {
        &self.filter_types
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn group_index(&self) -> usize {
        self.group_index
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// All matches in `haystack`, failing hard on any span larger than the block size
    pub fn find_matches(&self, haystack: &str) -> Result<Vec<FilterMatch>> {
        let mut matches = Vec::new();
        for caps in self.regex.captures_iter(haystack) {
            let Some(whole) = caps.get_match() else {
                continue;
            };
            // WHY: an optional group that did not participate marks nothing
            let Some(span) = caps.get_group(self.group_index) else {
                continue;
            };
            let match_text = &haystack[whole.start()..whole.end()];

            if span.end - span.start > self.block_size {
                return Err(RawTextError::MatchExceedsBlockSize {
                    match_len: span.end - span.start,
                    block_size: self.block_size,
                    pattern: self.pattern.clone(),
                    text: match_text.to_string(),
                });
            }

            let insertion_text = self
                .replacement
                .as_deref()
                .map(|replacement| caps.interpolate_string(haystack, replacement));

            trace!(
                filter = %self.id,
                start = span.start,
                end = span.end,
                match_text,
                "Regex match"
            );
            matches.push(FilterMatch {
                start: span.start,
                end: span.end,
                match_text: match_text.to_string(),
                insertion_text,
            });
        }
        Ok(matches)
    }

    /// Markers for `text`, positioned relative to `text`, already in replay order.
    /// Matching sees `prev` and `next` so patterns may straddle either boundary.
    pub fn apply(&self, prev: &str, text: &str, next: &str) -> Result<Vec<Marker>> {
        let block = RawBlock::new(prev, text, next);
        let (text_start, text_end) = block.text_range();
        let mut markers = Vec::new();

        for m in self.find_matches(&block.haystack())? {
            for annotation in self.annotations_for(&m) {
                if m.start >= text_start && m.start < text_end {
                    markers.extend(annotation.markers(Direction::Start, m.start - text_start));
                }
                if block.owns_end(m.end) {
                    markers.extend(annotation.markers(Direction::End, m.end - text_start));
                }
            }
        }

        sort_markers(&mut markers);
        Ok(markers)
    }

    /// Annotations for every match starting inside `block.text`, one per filter type,
    /// positioned relative to the start of `block.text`
    pub fn annotate(&self, block: &RawBlock<'_>) -> Result<Vec<Annotation>> {
        let (text_start, text_end) = block.text_range();
        let mut annotations = Vec::new();

        for m in self.find_matches(&block.haystack())? {
            if m.start < text_start || m.start >= text_end {
                continue;
            }
            annotations.extend(
                self.annotations_for(&m)
                    .map(|a| a.shift(m.start - text_start, m.end - text_start)),
            );
        }
        Ok(annotations)
    }

    fn annotations_for<'m>(&'m self, m: &'m FilterMatch) -> impl Iterator<Item = Annotation> + 'm {
        self.filter_types.iter().map(move |&filter_type| Annotation {
            start: m.start,
            end: m.end,
            filter_type,
            source: self.id,
            match_text: m.match_text.clone(),
            insertion_text: match filter_type {
                FilterType::Replace => Some(m.insertion_text.clone().unwrap_or_default()),
                _ => None,
            },
            tag: match filter_type {
                FilterType::Tag => self.tag.clone(),
                _ => None,
            },
        })
    }
}
