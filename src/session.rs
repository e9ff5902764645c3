use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::config::ProcessorConfig;
use crate::error::{RawTextError, Result};
use crate::filter::RegexFilter;
use crate::rolling::RollingWindow;
use crate::sentence::Sentence;

/// Empty chunks rolled in at end of input so the last real chunk reaches holder 2
const DRAIN_ROLLS: usize = 3;

/// Pull-driven sentence iterator over a byte reader.
///
/// Input is read in chunks of at least `block_size` bytes, cut on character
/// boundaries. Each chunk is rolled into a [`RollingWindow`], annotated with the
/// filters and drained of finished sentences. The iterator stops after the
/// first error.
pub struct SentenceStream<R> {
    reader: R,
    window: Option<RollingWindow>,
    filters: Vec<RegexFilter>,
    block_size: usize,
    pending: Vec<u8>,
    /// Bytes of the current input already handed to the window
    offset: usize,
    eof: bool,
    done: bool,
    ready: VecDeque<Sentence>,
}

impl<R: Read> SentenceStream<R> {
    pub fn new(reader: R, filters: Vec<RegexFilter>, config: &ProcessorConfig) -> Result<Self> {
        info!(
            filters = filters.len(),
            block_size = config.block_size,
            process_by_default = config.process_by_default,
            "Starting sentence stream"
        );
        Ok(Self {
            reader,
            window: Some(RollingWindow::new(config)?),
            filters,
            // WHY: a zero block size would never make progress
            block_size: config.block_size.max(1),
            pending: Vec::new(),
            offset: 0,
            eof: false,
            done: false,
            ready: VecDeque::new(),
        })
    }

    /// Record `path` as the file the first input comes from
    pub fn with_file(mut self, path: &Path) -> Self {
        if let Some(window) = self.window.as_mut() {
            window.on_next_file(path);
        }
        self
    }

    /// Finish the current input and continue with `reader`, numbering lines and
    /// offsets from the start of `path`. Region state carries over.
    ///
    /// Sentences from the rest of the current input stay queued ahead of the new
    /// file's sentences.
    pub fn next_file(&mut self, reader: R, path: &Path) -> Result<()> {
        while let Some(chunk) = self.next_chunk()? {
            self.feed(&chunk)?;
        }
        self.drain()?;

        debug!(file = %path.display(), "Switching input file");
        self.reader = reader;
        self.pending.clear();
        self.offset = 0;
        self.eof = false;
        self.done = false;
        if let Some(window) = self.window.as_mut() {
            window.on_next_file(path);
        }
        Ok(())
    }

    /// Current window, for inspecting region state and carried text between pulls
    pub fn window(&self) -> Option<&RollingWindow> {
        self.window.as_ref()
    }

    fn advance(&mut self) -> Result<()> {
        match self.next_chunk()? {
            Some(chunk) => self.feed(&chunk),
            None => {
                self.drain()?;
                self.done = true;
                Ok(())
            }
        }
    }

    fn feed(&mut self, chunk: &str) -> Result<()> {
        let Some(window) = self.window.take() else {
            return Ok(());
        };
        let mut window = window.roll(chunk)?;
        window.annotate(&self.filters)?;
        self.ready.extend(window.detected_sentences()?);
        self.window = Some(window);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        for _ in 0..DRAIN_ROLLS {
            self.feed("")?;
        }
        if let Some(tail) = self.window.as_mut().and_then(RollingWindow::finish) {
            self.ready.push_back(tail);
        }
        Ok(())
    }

    /// Next chunk of whole characters, `None` once the reader is exhausted
    fn next_chunk(&mut self) -> Result<Option<String>> {
        // a cut at block_size may need up to 3 more bytes to finish a character
        let wanted = self.block_size + 4;
        let mut buf = vec![0u8; self.block_size];
        while !self.eof && self.pending.len() < wanted {
            match self.reader.read(&mut buf) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if self.pending.is_empty() {
            return Ok(None);
        }

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() && !self.eof => e.valid_up_to(),
            Err(e) => {
                return Err(RawTextError::InvalidUtf8 {
                    offset: self.offset + e.valid_up_to(),
                })
            }
        };
        let text = std::str::from_utf8(&self.pending[..valid]).map_err(|e| {
            RawTextError::InvalidUtf8 {
                offset: self.offset + e.valid_up_to(),
            }
        })?;
        let mut cut = self.block_size.min(valid);
        while !text.is_char_boundary(cut) {
            cut += 1;
        }
        let chunk = text[..cut].to_string();

        self.pending.drain(..cut);
        self.offset += cut;
        Ok(Some(chunk))
    }
}

impl<R: Read> Iterator for SentenceStream<R> {
    type Item = Result<Sentence>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(sentence) = self.ready.pop_front() {
                return Some(Ok(sentence));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.advance() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
