// WHY: cleanup runs on the carried-over sentence and the new slice together, so
// a character dropped anywhere drops its provenance entry in the same step

use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::{debug, trace};

use crate::holder::{Residue, SentenceHolder, TagEvent};
use crate::marker::TagLabel;
use crate::sentence::{Sentence, Tag};

/// Sentences cut from one holder, plus what to carry forward into the next one
#[derive(Debug, Default)]
pub struct Extraction {
    pub sentences: Vec<Sentence>,
    pub leftover: Option<Sentence>,
    /// Marks on the holder's last offset, owed to the next holder's first sentence
    pub residue: Option<Residue>,
}

/// Slices a [`SentenceHolder`] into [`Sentence`]s at its boundaries
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceExtractor;

/// Whitespace as far as sentence cleanup is concerned
pub fn is_blank(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\u{0B}' || c == '\u{FEFF}'
}

impl SentenceExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Cut every sentence the holder's boundaries delimit, starting with `leftover`
    /// (the incomplete tail of the previous holder) if there is one.
    ///
    /// Text after the last boundary becomes an incomplete sentence returned as
    /// the new leftover, unless the holder ends the input. Raw output and tags
    /// recorded on the holder's last offset come back as the residue, since the
    /// text they precede has not arrived yet. Extraction consumes the holder: a
    /// second call without new boundaries returns nothing.
    pub fn extract(&self, holder: &mut SentenceHolder, leftover: Option<Sentence>) -> Extraction {
        let len = holder.processed_text.len();
        let start = holder.consumed.min(len);

        // exclusive slice ends, flagged when synthetic
        let mut ends: Vec<(usize, bool)> = Vec::new();
        // with nothing carried, a break before any text repeats the previous boundary
        if holder.closes_leftover && leftover.is_some() {
            ends.push((start, false));
        }
        ends.extend(
            holder
                .sentence_boundaries
                .range(start..len)
                .map(|&boundary| (boundary + 1, false)),
        );
        let covered = ends.last().map_or(start, |&(end, _)| end);
        if covered < len || (ends.is_empty() && leftover.is_some()) {
            ends.push((len, true));
        }

        let mut leftover = leftover;
        let mut sentences = Vec::with_capacity(ends.len() + 1);
        let mut current = start;
        let mut tail_taken = false;
        for (end, synthetic) in ends {
            let complete = !(synthetic && !holder.end_of_block);
            // marks after the last character of the input stay with that text
            let include_end = synthetic && holder.end_of_block;
            tail_taken |= include_end;
            let sentence = self.build_sentence(holder, current, end, leftover.take(), complete, include_end);
            trace!(text = sentence.text(), complete, "Extracted sentence");
            sentences.push(sentence);
            current = end;
        }

        let mut residue = None;
        if !tail_taken && holder.has_marks_at(len) {
            if holder.end_of_block {
                // input ends right after a finished sentence: the marks stand alone
                sentences.push(self.build_sentence(holder, len, len, None, true, true));
            } else {
                residue = holder.take_residue(len);
            }
        }

        holder.consumed = current;
        holder.closes_leftover = false;
        holder.clear_marks();

        let leftover = match sentences.last() {
            Some(last) if !last.complete => sentences.pop(),
            _ => None,
        };
        debug!(
            sentences = sentences.len(),
            has_leftover = leftover.is_some(),
            has_residue = residue.is_some(),
            "Extracted sentences from holder"
        );
        Extraction { sentences, leftover, residue }
    }

    fn build_sentence(
        &self,
        holder: &SentenceHolder,
        from: usize,
        to: usize,
        leftover: Option<Sentence>,
        complete: bool,
        include_end: bool,
    ) -> Sentence {
        let mut raw = String::new();
        let mut raw_indexes = Vec::new();
        let mut segments: BTreeMap<usize, String> = BTreeMap::new();
        let mut carried_tags = Vec::new();
        let mut carried_open = Vec::new();
        let mut newlines = BTreeMap::new();
        let mut leftover_original_text = String::new();
        let mut file = holder.file.clone();

        if let Some(previous) = leftover {
            raw = previous.text;
            raw_indexes = previous.original_indexes;
            segments = previous.original_text_segments;
            carried_tags = previous.tags;
            carried_open = previous.open_tags;
            newlines = previous.newlines;
            leftover_original_text = previous.leftover_original_text;
            file = previous.file.or(file);
        }

        let marks = (
            Bound::Included(from),
            if include_end { Bound::Included(to) } else { Bound::Excluded(to) },
        );
        let offset = raw.len();
        raw.push_str(&holder.processed_text[from..to]);
        raw_indexes.extend_from_slice(&holder.original_indexes[from..to]);
        for (&key, segment) in holder.original_text_segments.range(marks) {
            let slot = segments.entry(key - from + offset).or_default();
            if !slot.is_empty() {
                slot.push_str(holder.output_divider());
            }
            slot.push_str(segment);
        }
        newlines.extend(holder.newlines.iter().map(|(&k, &v)| (k, v)));

        let (text, original_indexes, position_map) = clean(&raw, &raw_indexes, complete);
        let out_len = text.len();

        let original_text_segments = segments
            .into_iter()
            .fold(BTreeMap::new(), |mut acc: BTreeMap<usize, String>, (key, segment)| {
                let slot = acc.entry(position_map[key]).or_default();
                if !slot.is_empty() {
                    slot.push_str(holder.output_divider());
                }
                slot.push_str(&segment);
                acc
            });

        // carried tags were positioned in the leftover's text, which is a prefix of `raw`
        let mut tags: Vec<Tag> = carried_tags
            .into_iter()
            .map(|tag| Tag {
                start: position_map[tag.start],
                end: position_map[tag.end.min(offset)],
                ..tag
            })
            .collect();
        let mut open: Vec<usize> = carried_open;

        for (&key, events) in holder.tag_events.range(marks) {
            let at = position_map[key - from + offset];
            for event in events {
                match event {
                    TagEvent::Open(label) => {
                        open.push(tags.len());
                        tags.push(open_tag(label, at));
                    }
                    TagEvent::Close(label) => close_tag(&mut tags, &mut open, label, at),
                }
            }
        }

        for &index in &open {
            tags[index].end = out_len;
        }
        if complete {
            open.clear();
        }

        Sentence {
            text,
            original_indexes,
            original_text_segments,
            newlines,
            tags,
            open_tags: open,
            complete,
            file,
            leftover_original_text,
        }
    }
}

fn open_tag(label: &TagLabel, at: usize) -> Tag {
    Tag {
        attribute: label.attribute.clone(),
        value: label.value.clone(),
        start: at,
        end: at,
    }
}

/// Close the most recently opened matching tag; with none open, the tag is taken
/// to have started before this sentence and runs from 0
fn close_tag(tags: &mut Vec<Tag>, open: &mut Vec<usize>, label: &TagLabel, at: usize) {
    let found = open.iter().rposition(|&i| {
        tags[i].attribute == label.attribute && tags[i].value == label.value
    });
    match found {
        Some(slot) => {
            let index = open.remove(slot);
            tags[index].end = at;
        }
        None => {
            let mut tag = open_tag(label, 0);
            tag.end = at;
            tags.push(tag);
        }
    }
}

/// Trim leading blanks, trim trailing blanks when `trim_end`, and collapse every run
/// of blanks to its first character.
///
/// Returns the cleaned text, its per-byte original indexes, and a map from every
/// byte offset of `raw` (plus one past the end) to the cleaned length before it.
fn clean(raw: &str, raw_indexes: &[usize], trim_end: bool) -> (String, Vec<usize>, Vec<usize>) {
    let first_kept = raw
        .char_indices()
        .find(|&(_, c)| !is_blank(c))
        .map_or(raw.len(), |(i, _)| i);
    let last_kept_end = if trim_end {
        raw.char_indices()
            .rev()
            .find(|&(_, c)| !is_blank(c))
            .map_or(0, |(i, c)| i + c.len_utf8())
    } else {
        raw.len()
    };

    let mut text = String::with_capacity(raw.len());
    let mut indexes = Vec::with_capacity(raw_indexes.len());
    let mut position_map = vec![0; raw.len() + 1];
    let mut previous_blank = false;

    for (i, c) in raw.char_indices() {
        let width = c.len_utf8();
        position_map[i..i + width].fill(text.len());

        let blank = is_blank(c);
        let keep = i >= first_kept && i < last_kept_end && !(blank && previous_blank);
        previous_blank = blank;

        if keep {
            text.push(c);
            indexes.extend_from_slice(&raw_indexes[i..i + width]);
        }
    }
    position_map[raw.len()] = text.len();

    (text, indexes, position_map)
}
