// WHY: filters return annotations by value and the window merges them; nothing
// registers callbacks on the window, so its state only changes through these methods

use std::path::Path;
use tracing::{debug, warn};

use crate::config::ProcessorConfig;
use crate::error::{RawTextError, Result};
use crate::extractor::{Extraction, SentenceExtractor};
use crate::filter::{Annotation, RawBlock, RegexFilter};
use crate::holder::{Residue, SentenceHolder};
use crate::interpreter::{RegionInterpreter, RegionState};
use crate::marker::{sort_markers, Direction};
use crate::sentence::Sentence;

/// Processed text of the three holders behind a window, for boundary detection.
///
/// Only `[analysis_start, analysis_end)` (holder 2) may receive boundaries; the
/// text either side is context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedWindow {
    pub text: String,
    pub original_indexes: Vec<usize>,
    pub analysis_start: usize,
    pub analysis_end: usize,
}

impl ProcessedWindow {
    /// The holder 2 part of the window
    pub fn analysis_text(&self) -> &str {
        &self.text[self.analysis_start..self.analysis_end]
    }
}

/// Four consecutive raw blocks (oldest first) and the holders of the first three.
///
/// Block 3 is the one annotated and interpreted next, with block 2 as left and
/// block 4 as right context. Holder 2 is the one sentences are extracted from,
/// so consumers always see one processed holder either side of it.
///
/// Annotation positions are window byte offsets: 0 is the start of block 1.
#[derive(Debug)]
pub struct RollingWindow {
    blocks: [String; 4],
    annotations: Vec<Annotation>,
    holders: [Option<SentenceHolder>; 3],
    interpreter: RegionInterpreter,
    extractor: SentenceExtractor,
    leftover: Option<Sentence>,
    residue: Option<Residue>,
    output_divider: String,
}

impl RollingWindow {
    /// Empty window: blank blocks and empty finished holders, so the first roll
    /// behaves like any other
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        let seed = || Some(SentenceHolder::new(0, true, &config.output_divider));
        Ok(Self {
            blocks: Default::default(),
            annotations: Vec::new(),
            holders: [seed(), seed(), seed()],
            interpreter: RegionInterpreter::new(config)?,
            extractor: SentenceExtractor::new(),
            leftover: None,
            residue: None,
            output_divider: config.output_divider.clone(),
        })
    }

    /// Push `next` in as block 4 and drop block 1.
    ///
    /// Block 3 is interpreted first if nobody asked for it yet, so no block leaves
    /// the interpreting position unprocessed. Carried annotations move left by the
    /// length of the dropped block; those ending before the new window are dropped.
    pub fn roll(mut self, next: &str) -> Result<Self> {
        self.process()?;

        let shift = self.blocks[0].len();
        let before = self.annotations.len();
        self.annotations = std::mem::take(&mut self.annotations)
            .into_iter()
            .filter(|a| a.end >= shift)
            .map(|a| {
                let (start, end) = (a.start.saturating_sub(shift), a.end - shift);
                a.shift(start, end)
            })
            .collect();
        if self.annotations.len() < before {
            debug!(
                dropped = before - self.annotations.len(),
                "Dropped annotations that left the window"
            );
        }

        self.holders.rotate_left(1);
        self.holders[2] = None;
        self.blocks.rotate_left(1);
        self.blocks[3] = next.to_string();

        debug!(
            next_len = next.len(),
            annotations = self.annotations.len(),
            "Rolled window"
        );
        Ok(self)
    }

    /// Block 3 with its context, as filters see it
    pub fn raw_block(&self) -> RawBlock<'_> {
        RawBlock::new(&self.blocks[1], &self.blocks[2], &self.blocks[3])
    }

    /// Run every filter over block 3 and keep the annotations
    pub fn annotate(&mut self, filters: &[RegexFilter]) -> Result<()> {
        let mut found = Vec::new();
        {
            let block = self.raw_block();
            for filter in filters {
                found.extend(filter.annotate(&block)?);
            }
        }
        self.add_annotations(found);
        Ok(())
    }

    /// Merge annotations positioned relative to the start of block 3
    pub fn add_annotations(&mut self, annotations: Vec<Annotation>) {
        if annotations.is_empty() {
            return;
        }
        if self.holders[2].is_some() {
            warn!(
                count = annotations.len(),
                "Annotations added after block 3 was interpreted; their starts are ignored"
            );
        }
        let offset = self.block3_start();
        self.annotations.extend(
            annotations
                .into_iter()
                .map(|a| {
                    let (start, end) = (a.start + offset, a.end + offset);
                    a.shift(start, end)
                }),
        );
    }

    /// Interpret block 3 into holder 3 unless that already happened
    pub fn process(&mut self) -> Result<&SentenceHolder> {
        let holder = match self.holders[2].take() {
            Some(holder) => holder,
            None => self.interpret_block3()?,
        };
        Ok(self.holders[2].insert(holder))
    }

    fn interpret_block3(&mut self) -> Result<SentenceHolder> {
        let start = self.block3_start();
        let text = &self.blocks[2];
        let end = start + text.len();
        let final_block = self.blocks[3].is_empty();

        let mut markers = Vec::new();
        for annotation in &self.annotations {
            if annotation.start >= start && annotation.start < end {
                markers.extend(annotation.markers(Direction::Start, annotation.start - start));
            }
            // an end on the block edge belongs to the next block unless this is the last one
            let owns_end = annotation.end >= start
                && (annotation.end < end
                    || (annotation.end == end && !text.is_empty() && final_block));
            if owns_end {
                markers.extend(annotation.markers(Direction::End, annotation.end - start));
            }
        }
        sort_markers(&mut markers);

        debug!(
            block_len = text.len(),
            markers = markers.len(),
            final_block,
            "Interpreting block"
        );
        self.interpreter.process(text, &markers, final_block)
    }

    /// Holders 1 to 3 laid end to end, with holder 2 as the analysis range
    pub fn processed_window(&mut self) -> Result<ProcessedWindow> {
        self.process()?;
        let mut window = ProcessedWindow {
            text: String::new(),
            original_indexes: Vec::new(),
            analysis_start: 0,
            analysis_end: 0,
        };
        for (i, holder) in self.holders.iter().enumerate() {
            if i == 1 {
                window.analysis_start = window.text.len();
            }
            if let Some(holder) = holder {
                window.text.push_str(holder.processed_text());
                window.original_indexes.extend_from_slice(holder.original_indexes());
            }
            if i == 1 {
                window.analysis_end = window.text.len();
            }
        }
        Ok(window)
    }

    /// Mark a sentence end at a [`ProcessedWindow`] offset inside holder 2
    pub fn add_sentence_boundary(&mut self, window_position: usize) -> Result<()> {
        let start = self.holders[0].as_ref().map_or(0, SentenceHolder::len);
        let end = start + self.holders[1].as_ref().map_or(0, SentenceHolder::len);
        match self.holders[1].as_mut() {
            Some(holder) if (start..end).contains(&window_position) => {
                holder.add_sentence_boundary(window_position - start);
                Ok(())
            }
            _ => Err(RawTextError::BoundaryOutOfRange {
                position: window_position,
                start,
                end,
            }),
        }
    }

    /// Extract the sentences finished in holder 2.
    ///
    /// The unterminated tail is kept and merged into the next call's first
    /// sentence. Raw output and tags on holder 2's last offset are handed to the
    /// next holder, so they land where a single unsplit chunk would put them.
    pub fn detected_sentences(&mut self) -> Result<Vec<Sentence>> {
        self.process()?;
        let Some(holder) = self.holders[1].as_mut() else {
            return Ok(Vec::new());
        };
        if let Some(residue) = self.residue.take() {
            holder.prepend_residue(residue);
        }

        let Extraction { sentences, leftover, residue } =
            self.extractor.extract(holder, self.leftover.take());
        self.leftover = leftover;
        self.residue = residue;

        let found = sentences.len();
        let sentences: Vec<Sentence> = sentences
            .into_iter()
            .filter(|s| !(s.is_complete() && s.carries_nothing()))
            .collect();
        if sentences.len() < found {
            debug!(dropped = found - sentences.len(), "Dropped empty sentences");
        }
        Ok(sentences)
    }

    /// Hand back whatever is still carried once input is exhausted: the tail
    /// sentence and any raw output whose region never closed
    pub fn finish(&mut self) -> Option<Sentence> {
        let mut tail = None;
        if self.leftover.is_some() || self.residue.is_some() {
            let mut holder =
                SentenceHolder::new(self.interpreter.original_text_index(), true, &self.output_divider);
            holder.set_file(self.interpreter.file().map(Path::to_path_buf));
            if let Some(residue) = self.residue.take() {
                holder.prepend_residue(residue);
            }
            tail = self
                .extractor
                .extract(&mut holder, self.leftover.take())
                .sentences
                .pop();
        }

        let pending_output = self.interpreter.take_leftover_output();
        if !pending_output.is_empty() {
            let file = self.interpreter.file().map(Path::to_path_buf);
            let sentence = tail.get_or_insert_with(|| {
                let mut sentence = Sentence::empty(file);
                sentence.complete = true;
                sentence
            });
            sentence.append_leftover_original_text(&pending_output, &self.output_divider);
        }
        tail.filter(|s| !s.carries_nothing())
    }

    /// Start numbering lines and offsets afresh for a new input file
    pub fn on_next_file(&mut self, file: &Path) {
        self.interpreter.on_next_file(file);
    }

    /// Raw output carried by the unterminated tail sentence
    pub fn leftover_original_text(&self) -> Option<&str> {
        self.leftover.as_ref().and_then(Sentence::leftover_original_text)
    }

    pub fn leftover(&self) -> Option<&Sentence> {
        self.leftover.as_ref()
    }

    pub fn region_state(&self) -> &RegionState {
        self.interpreter.state()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn blocks(&self) -> &[String; 4] {
        &self.blocks
    }

    /// Holder 1, 2 or 3 (0-based); holder 3 is `None` until block 3 is processed
    pub fn holder(&self, index: usize) -> Option<&SentenceHolder> {
        self.holders.get(index).and_then(Option::as_ref)
    }

    fn block3_start(&self) -> usize {
        self.blocks[0].len() + self.blocks[1].len()
    }
}
