pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod holder;
pub mod interpreter;
pub mod marker;
pub mod rolling;
pub mod sentence;
pub mod session;

// Re-export main types for convenient access
pub use config::ProcessorConfig;
pub use error::{RawTextError, Result};
pub use extractor::{Extraction, SentenceExtractor};
pub use filter::{parse_descriptor, parse_descriptors, Annotation, FilterMatch, RawBlock, RegexFilter};
pub use holder::{Residue, SentenceHolder, TagEvent};
pub use interpreter::{RegionInterpreter, RegionState};
pub use marker::{
    sort_markers, AttributeValue, Direction, Effect, FilterId, FilterType, Marker, MarkerKind, Stack,
    TagLabel,
};
pub use rolling::{ProcessedWindow, RollingWindow};
pub use sentence::{Sentence, Tag};
pub use session::SentenceStream;
