// Integration test utilities and common code
// WHY: every test drives the same roll/annotate/extract loop, so it lives here once
#![allow(dead_code)]

use rawsplit::{parse_descriptors, ProcessorConfig, RegexFilter, RollingWindow, Sentence, SentenceStream, Tag};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BLOCK_SIZE: usize = 1000;

/// Temporary directory for config and filter files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();
        Self { temp_dir, root_path }
    }

    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }
}

pub fn filters(descriptors: &str) -> Vec<RegexFilter> {
    parse_descriptors(descriptors, 0, BLOCK_SIZE).expect("Descriptors should parse")
}

/// Feed `chunks` through a window exactly as given, then drain it
pub fn window_sentences(chunks: &[&str], descriptors: &str) -> Vec<Sentence> {
    window_sentences_with(chunks, &filters(descriptors), &ProcessorConfig::default())
}

pub fn window_sentences_with(chunks: &[&str], filters: &[RegexFilter], config: &ProcessorConfig) -> Vec<Sentence> {
    let mut window = RollingWindow::new(config).expect("Window should build");
    let mut sentences = Vec::new();
    for chunk in chunks.iter().copied().chain(["", "", ""]) {
        window = window.roll(chunk).expect("Roll should succeed");
        window.annotate(filters).expect("Annotation should succeed");
        sentences.extend(window.detected_sentences().expect("Extraction should succeed"));
    }
    sentences.extend(window.finish());
    sentences
}

/// Stream `input` through a [`SentenceStream`] with the given block size
pub fn stream_sentences(input: &str, block_size: usize, descriptors: &str) -> Vec<Sentence> {
    let config = ProcessorConfig {
        block_size,
        ..ProcessorConfig::default()
    };
    let filters = parse_descriptors(descriptors, 0, block_size).expect("Descriptors should parse");
    SentenceStream::new(input.as_bytes(), filters, &config)
        .expect("Stream should build")
        .collect::<rawsplit::Result<Vec<_>>>()
        .expect("Stream should succeed")
}

pub fn texts(sentences: &[Sentence]) -> Vec<String> {
    sentences.iter().map(|s| s.text().to_string()).collect()
}

/// Everything a consumer can observe about a sentence except its line table,
/// which holds one seed entry per chunk and so depends on the chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub text: String,
    pub original_indexes: Vec<usize>,
    pub segments: BTreeMap<usize, String>,
    pub leftover_original_text: Option<String>,
    pub tags: Vec<Tag>,
    pub complete: bool,
}

pub fn provenance(sentences: &[Sentence]) -> Vec<Provenance> {
    sentences
        .iter()
        .map(|s| Provenance {
            text: s.text().to_string(),
            original_indexes: s.original_indexes().to_vec(),
            segments: s.original_text_segments().clone(),
            leftover_original_text: s.leftover_original_text().map(str::to_string),
            tags: s.tags().to_vec(),
            complete: s.is_complete(),
        })
        .collect()
}

/// Split `input` into chunks of the given sizes, cycling through them
pub fn chunk(input: &str, sizes: &[usize]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = input;
    let mut i = 0;
    while !rest.is_empty() {
        let mut size = sizes[i % sizes.len()].max(1).min(rest.len());
        while !rest.is_char_boundary(size) {
            size += 1;
        }
        let (head, tail) = rest.split_at(size);
        chunks.push(head.to_string());
        rest = tail;
        i += 1;
    }
    chunks
}
