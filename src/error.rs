// WHY: one typed error for the library so callers can tell configuration mistakes
// apart from data-dependent failures; the binary wraps it in anyhow for context

use thiserror::Error;

use crate::marker::MarkerKind;

/// Errors raised while building filters or processing raw text
#[derive(Debug, Error)]
pub enum RawTextError {
    /// A filter descriptor line could not be parsed
    #[error("invalid filter descriptor on line {line}: {reason}")]
    InvalidDescriptor { line: usize, reason: String },

    #[error("unknown filter type: {0}")]
    UnknownFilterType(String),

    #[error("unknown text filter: {0}")]
    UnknownFilter(String),

    #[error("group index {group} out of range, pattern has {available} groups")]
    InvalidGroupIndex { group: usize, available: usize },

    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: Box<regex_automata::meta::BuildError>,
    },

    /// A match longer than the block size could be cut by a chunk boundary,
    /// corrupting the original index trace.
    #[error(
        "match size ({match_len}) bigger than block size ({block_size}); increase block_size \
         or change the filter (a greedy quantifier such as .* may need to be reluctant, .*?). \
         Regex: {pattern}. Text: {text}"
    )]
    MatchExceedsBlockSize {
        match_len: usize,
        block_size: usize,
        pattern: String,
        text: String,
    },

    /// A Pop marker with nothing pushed underneath it
    #[error("unbalanced region: {kind:?} at raw position {position} with no open region")]
    UnbalancedRegion { kind: MarkerKind, position: usize },

    #[error("sentence boundary {position} outside analysed range [{start}, {end})")]
    BoundaryOutOfRange {
        position: usize,
        start: usize,
        end: usize,
    },

    #[error("invalid UTF-8 in input at byte offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for raw text operations
pub type Result<T> = std::result::Result<T, RawTextError>;
