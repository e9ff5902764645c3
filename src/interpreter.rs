// WHY: region state and the global counters live in one owned struct so several
// sessions can run side by side; nothing here is static

use regex_automata::meta::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::ProcessorConfig;
use crate::error::{RawTextError, Result};
use crate::holder::SentenceHolder;
use crate::marker::{Effect, Marker, MarkerKind, Stack};

const NEWLINE_PATTERN: &str = r"\r\n|[\r\n]";

/// The two region stacks. Neither is ever empty: each keeps its seed value at the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionState {
    process_stack: Vec<bool>,
    output_stack: Vec<bool>,
}

impl RegionState {
    pub fn new(process_by_default: bool) -> Self {
        Self {
            process_stack: vec![process_by_default],
            output_stack: vec![false],
        }
    }

    /// Raw text is currently copied into processed text
    pub fn processing(&self) -> bool {
        matches!(self.process_stack.last(), Some(true))
    }

    /// Raw text is currently captured for verbatim output. Only skipped text is captured.
    pub fn outputting(&self) -> bool {
        matches!(self.output_stack.last(), Some(true)) && !self.processing()
    }

    pub fn process_stack(&self) -> &[bool] {
        &self.process_stack
    }

    pub fn output_stack(&self) -> &[bool] {
        &self.output_stack
    }

    fn stack_mut(&mut self, stack: Stack) -> &mut Vec<bool> {
        match stack {
            Stack::Process => &mut self.process_stack,
            Stack::Output => &mut self.output_stack,
        }
    }

    fn apply(&mut self, effect: Effect, kind: MarkerKind, position: usize) -> Result<()> {
        match effect {
            Effect::Push(stack, value) => self.stack_mut(stack).push(value),
            Effect::Pop(stack) => {
                let stack = self.stack_mut(stack);
                if stack.len() <= 1 {
                    return Err(RawTextError::UnbalancedRegion { kind, position });
                }
                stack.pop();
            }
            // WHY: START/STOP filters toggle the default state, so they may rewrite the seed
            Effect::SetTop(stack, value) => {
                if let Some(top) = self.stack_mut(stack).last_mut() {
                    *top = value;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Replays markers over raw chunks, turning them into [`SentenceHolder`]s.
///
/// Region state, the running original offset, line numbering and any output
/// capture still open at the end of a chunk carry over to the next call.
#[derive(Debug, Clone)]
pub struct RegionInterpreter {
    state: RegionState,
    original_text_index: usize,
    line_number: usize,
    leftover_newline: usize,
    trailing_cr: bool,
    leftover_output: String,
    /// Last processed character of earlier chunks, `None` before any text
    last_processed: Option<char>,
    output_divider: String,
    file: Option<PathBuf>,
    newline: Regex,
}

/// Read positions into the current raw chunk
#[derive(Debug, Default)]
struct Cursor {
    current: usize,
    output: usize,
}

impl RegionInterpreter {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        let newline = Regex::new(NEWLINE_PATTERN).map_err(|source| RawTextError::InvalidRegex {
            pattern: NEWLINE_PATTERN.to_string(),
            source: Box::new(source),
        })?;
        Ok(Self {
            state: RegionState::new(config.process_by_default),
            original_text_index: 0,
            // the line after the first newline is 2; text before it is line 1
            line_number: 2,
            leftover_newline: 0,
            trailing_cr: false,
            leftover_output: String::new(),
            last_processed: None,
            output_divider: config.output_divider.clone(),
            file: None,
            newline,
        })
    }

    pub fn state(&self) -> &RegionState {
        &self.state
    }

    /// Global original offset of the next chunk's first byte
    pub fn original_text_index(&self) -> usize {
        self.original_text_index
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Raw output captured at the end of the last chunk, waiting for its region to close
    pub fn leftover_output(&self) -> &str {
        &self.leftover_output
    }

    pub(crate) fn take_leftover_output(&mut self) -> String {
        std::mem::take(&mut self.leftover_output)
    }

    /// Reset provenance counters for a new input file. Region state is kept.
    pub fn on_next_file(&mut self, file: &Path) {
        debug!(file = %file.display(), "Resetting provenance for next file");
        self.file = Some(file.to_path_buf());
        self.line_number = 2;
        self.original_text_index = 0;
        self.leftover_newline = 0;
        self.trailing_cr = false;
    }

    /// Interpret one raw chunk. `markers` are positioned in `raw` and already in replay
    /// order. `end_of_block` says nothing follows this chunk.
    pub fn process(&mut self, raw: &str, markers: &[Marker], end_of_block: bool) -> Result<SentenceHolder> {
        let mut holder = SentenceHolder::new(self.original_text_index, end_of_block, &self.output_divider);
        holder.set_file(self.file.clone());
        self.track_newlines(raw, &mut holder);

        let base = self.original_text_index;
        let mut cursor = Cursor::default();

        for marker in markers {
            let position = marker.position.min(raw.len());
            trace!(
                kind = ?marker.kind,
                position,
                source = %marker.source,
                process_stack = ?self.state.process_stack,
                "Replaying marker"
            );
            for &effect in marker.kind.effects() {
                self.apply_effect(effect, marker, position, raw, base, &mut cursor, &mut holder)?;
            }
        }

        if self.state.processing() {
            flush(&mut holder, raw, cursor.current, raw.len(), base);
        }
        if self.state.outputting() {
            self.leftover_output.push_str(&raw[cursor.output.min(raw.len())..]);
        }

        if let Some(last) = holder.processed_text().chars().next_back() {
            self.last_processed = Some(last);
        }
        self.original_text_index += raw.len();
        debug!(
            raw_len = raw.len(),
            processed_len = holder.len(),
            boundaries = holder.sentence_boundaries().len(),
            segments = holder.original_text_segments().len(),
            "Processed raw chunk"
        );
        Ok(holder)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_effect(
        &mut self,
        effect: Effect,
        marker: &Marker,
        position: usize,
        raw: &str,
        base: usize,
        cursor: &mut Cursor,
        holder: &mut SentenceHolder,
    ) -> Result<()> {
        let was_processing = self.state.processing();

        match effect {
            Effect::Push(..) | Effect::Pop(_) | Effect::SetTop(..) => {
                let was_outputting = self.state.outputting();
                self.state.apply(effect, marker.kind, base + position)?;
                let processing = self.state.processing();
                let outputting = self.state.outputting();

                if was_processing && !processing {
                    flush(holder, raw, cursor.current, position, base);
                } else if !was_processing && processing {
                    cursor.current = position;
                }

                if was_outputting && !outputting {
                    let mut segment = std::mem::take(&mut self.leftover_output);
                    segment.push_str(&raw[cursor.output.min(position)..position]);
                    holder.add_original_text_segment(holder.len(), segment);
                    cursor.output = position;
                } else if !was_outputting && outputting {
                    cursor.output = position;
                }
            }
            Effect::InsertText => {
                if was_processing {
                    flush(holder, raw, cursor.current, position, base);
                    cursor.current = position;
                    let text = marker.insertion_text.as_deref().unwrap_or_default();
                    holder.append_inserted(text, base + position);
                }
            }
            Effect::InsertSpace => {
                if was_processing {
                    flush(holder, raw, cursor.current, position, base);
                    cursor.current = position;
                    if !holder.processed_text().ends_with(' ') {
                        holder.append_inserted(" ", base + position);
                    }
                }
            }
            Effect::Break => {
                if was_processing {
                    flush(holder, raw, cursor.current, position, base);
                    cursor.current = position;
                }
                // the boundary is the last character actually appended
                if holder.is_empty() {
                    holder.closes_leftover = true;
                } else {
                    holder.add_sentence_boundary(holder.len() - 1);
                }
                // no blank before the first text; earlier chunks count, so splitting can't move it
                let last = holder.processed_text().chars().next_back().or(self.last_processed);
                if was_processing && last.is_some_and(|c| c != ' ') {
                    holder.append_inserted(" ", base + position);
                }
            }
            Effect::OpenTag | Effect::CloseTag => {
                if was_processing {
                    flush(holder, raw, cursor.current, position, base);
                    cursor.current = position;
                }
                match (&marker.tag, effect) {
                    (Some(tag), Effect::OpenTag) => holder.add_tag_start(holder.len(), tag.clone()),
                    (Some(tag), _) => holder.add_tag_end(holder.len(), tag.clone()),
                    (None, _) => debug!(source = %marker.source, "Tag marker without a tag label"),
                }
            }
        }
        Ok(())
    }

    fn track_newlines(&mut self, raw: &str, holder: &mut SentenceHolder) {
        let mut skip = 0;
        // a CRLF split across chunks is one newline, already counted at the CR
        if self.trailing_cr && raw.starts_with('\n') {
            self.leftover_newline += 1;
            skip = 1;
        }
        holder.add_newline(self.leftover_newline, self.line_number - 1);

        for m in self.newline.find_iter(&raw[skip..]) {
            let offset = self.original_text_index + skip + m.end();
            holder.add_newline(offset, self.line_number);
            self.line_number += 1;
            self.leftover_newline = offset;
        }
        if !raw.is_empty() {
            self.trailing_cr = raw.ends_with('\r');
        }
    }
}

/// Copy raw[from, to) into processed text
fn flush(holder: &mut SentenceHolder, raw: &str, from: usize, to: usize, base: usize) {
    if to > from {
        holder.append_raw(&raw[from..to], base + from);
    }
}
