use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rawsplit::{ProcessorConfig, RegexFilter, Sentence, SentenceStream};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rawsplit")]
#[command(about = "Split marked-up raw text into sentences while keeping every offset traceable")]
#[command(version)]
struct Args {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// TOML processor config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter descriptor file, read after any configured ones
    #[arg(long = "filters")]
    filters: Vec<PathBuf>,

    /// Largest match span and read chunk size, in bytes
    #[arg(long)]
    block_size: Option<usize>,

    /// Skip text outside INCLUDE regions
    #[arg(long)]
    skip_by_default: bool,

    /// Separator between raw output segments at the same position
    #[arg(long)]
    output_divider: Option<String>,

    /// Emit one JSON object per sentence
    #[arg(long)]
    json: bool,

    /// Use memory-mapped I/O instead of buffered reads
    #[arg(long)]
    use_mmap: bool,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Abort on first error
    #[arg(long)]
    fail_fast: bool,
}

/// One sentence as written by `--json`
#[derive(Debug, Serialize)]
struct SentenceRecord<'a> {
    text: &'a str,
    file: Option<String>,
    line: Option<usize>,
    column: Option<usize>,
    complete: bool,
    raw_segments: &'a BTreeMap<usize, String>,
    leftover_original_text: Option<&'a str>,
}

impl<'a> From<&'a Sentence> for SentenceRecord<'a> {
    fn from(sentence: &'a Sentence) -> Self {
        let start = sentence.original_start();
        Self {
            text: sentence.text(),
            file: sentence.file().map(|p| p.display().to_string()),
            line: start.and_then(|o| sentence.line_number(o)),
            column: start.and_then(|o| sentence.column_number(o)),
            complete: sentence.is_complete(),
            raw_segments: sentence.original_text_segments(),
            leftover_original_text: sentence.leftover_original_text(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: logs go to stderr so stdout carries nothing but sentences
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    let config = resolve_config(&args)?;
    // WHY: every descriptor error surfaces before any input is touched
    let filters = config.build_filters().context("Failed to build text filters")?;

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No input files matched {:?}", args.inputs);
    }
    info!(files = files.len(), "Resolved input files");

    let progress = if args.no_progress {
        None
    } else {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")?
                .progress_chars("##-"),
        );
        Some(bar)
    };

    let mut failed = 0usize;
    let mut total_sentences = 0usize;
    let stdout = std::io::stdout();

    for path in files {
        let result = process_file(path.clone(), filters.clone(), config.clone(), args.use_mmap, args.json).await;
        match result {
            Ok(lines) => {
                total_sentences += lines.len();
                let mut out = stdout.lock();
                for line in &lines {
                    writeln!(out, "{line}").context("Failed to write sentence")?;
                }
            }
            Err(e) if args.fail_fast => {
                return Err(e.context(format!("Failed to process {}", path.display())));
            }
            Err(e) => {
                error!(file = %path.display(), error = %format!("{e:#}"), "Failed to process file");
                failed += 1;
            }
        }
        if let Some(bar) = &progress {
            bar.set_message(path.display().to_string());
            bar.inc(1);
        }
    }

    if let Some(bar) = &progress {
        bar.finish_with_message("Complete");
    }
    info!(sentences = total_sentences, failed, "Processing complete");
    Ok(())
}

/// Config file (if any) with command line overrides applied
fn resolve_config(args: &Args) -> Result<ProcessorConfig> {
    let mut config = match &args.config {
        Some(path) => ProcessorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ProcessorConfig::default(),
    };
    if let Some(block_size) = args.block_size {
        if block_size == 0 {
            anyhow::bail!("--block-size must be greater than zero");
        }
        config.block_size = block_size;
    }
    if args.skip_by_default {
        config.process_by_default = false;
    }
    if let Some(divider) = &args.output_divider {
        config.output_divider = divider.clone();
    }
    config.filter_files.extend(args.filters.iter().cloned());
    Ok(config)
}

/// Expand glob patterns; plain paths pass through untouched
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.contains(['*', '?', '[']) {
            files.push(PathBuf::from(input));
            continue;
        }
        let before = files.len();
        for entry in glob::glob(input).with_context(|| format!("Invalid glob pattern {input}"))? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!(pattern = %input, error = %e, "Unreadable glob match"),
            }
        }
        if files.len() == before {
            warn!(pattern = %input, "Glob matched no files");
        }
    }
    Ok(files)
}

/// Run one file through a fresh stream on the blocking pool and render its sentences
async fn process_file(
    path: PathBuf,
    filters: Vec<RegexFilter>,
    config: ProcessorConfig,
    use_mmap: bool,
    json: bool,
) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || {
        let sentences = if use_mmap {
            let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
            // SAFETY: the map is read-only and dropped before this task returns
            let mmap = unsafe { memmap2::Mmap::map(&file) }
                .with_context(|| format!("Failed to map {}", path.display()))?;
            collect_sentences(&mmap[..], &path, filters, &config)?
        } else {
            let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
            collect_sentences(BufReader::new(file), &path, filters, &config)?
        };
        render(&sentences, json)
    })
    .await
    .context("Processing task panicked")?
}

fn collect_sentences<R: std::io::Read>(
    reader: R,
    path: &Path,
    filters: Vec<RegexFilter>,
    config: &ProcessorConfig,
) -> Result<Vec<Sentence>> {
    let stream = SentenceStream::new(reader, filters, config)?.with_file(path);
    let sentences = stream
        .collect::<rawsplit::Result<Vec<_>>>()
        .with_context(|| format!("Failed to split {}", path.display()))?;
    info!(file = %path.display(), sentences = sentences.len(), "Split file");
    Ok(sentences)
}

fn render(sentences: &[Sentence], json: bool) -> Result<Vec<String>> {
    sentences
        .iter()
        .map(|sentence| {
            if json {
                Ok(serde_json::to_string(&SentenceRecord::from(sentence))?)
            } else {
                Ok(render_plain(sentence))
            }
        })
        .collect()
}

/// Sentence text with every echoed raw segment put back where it was cut out
fn render_plain(sentence: &Sentence) -> String {
    let text = sentence.text();
    let mut line = String::with_capacity(text.len());
    let mut written = 0;
    for (&at, segment) in sentence.original_text_segments() {
        line.push_str(text.get(written..at).unwrap_or_default());
        line.push_str(segment);
        written = written.max(at);
    }
    line.push_str(text.get(written..).unwrap_or_default());
    line.push_str(sentence.leftover_original_text().unwrap_or_default());
    line
}
