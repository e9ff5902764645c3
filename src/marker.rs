// WHY: the marker vocabulary is data, not control flow. Filter types map to marker
// kinds and marker kinds map to primitive effects through fixed tables, so both
// mappings can be inspected and tested without running the interpreter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RawTextError;

/// Declaration index of the filter that produced a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FilterId(pub usize);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter#{}", self.0)
    }
}

/// Closed set of instructions a filter can anchor in raw text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    PushSkip,
    PushOutput,
    PushInclude,
    Insert,
    Space,
    SentenceBreak,
    PopSkip,
    PopOutput,
    PopInclude,
    Start,
    Stop,
    StartOutput,
    StopOutput,
    TagStart,
    TagEnd,
}

/// Whether a marker sits at the start or the end of its match.
/// Ordering matters: at equal positions starts are replayed before ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Start,
    End,
}

/// The two independent region stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stack {
    Process,
    Output,
}

/// Primitive effect executed by the region interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Push(Stack, bool),
    Pop(Stack),
    /// Replace the top of a stack without changing its depth
    SetTop(Stack, bool),
    InsertText,
    InsertSpace,
    Break,
    OpenTag,
    CloseTag,
}

impl MarkerKind {
    /// Primitive effects for this kind, executed in order
    pub fn effects(self) -> &'static [Effect] {
        use Effect::*;
        match self {
            MarkerKind::PushSkip => &[Push(Stack::Process, false)],
            MarkerKind::PushInclude => &[Push(Stack::Process, true)],
            MarkerKind::PushOutput => &[Push(Stack::Output, true)],
            MarkerKind::PopSkip | MarkerKind::PopInclude => &[Pop(Stack::Process)],
            MarkerKind::PopOutput => &[Pop(Stack::Output)],
            MarkerKind::Start => &[SetTop(Stack::Process, true)],
            MarkerKind::Stop => &[SetTop(Stack::Process, false)],
            MarkerKind::StartOutput => &[SetTop(Stack::Output, true)],
            MarkerKind::StopOutput => &[SetTop(Stack::Output, false)],
            MarkerKind::Insert => &[InsertText],
            MarkerKind::Space => &[InsertSpace],
            MarkerKind::SentenceBreak => &[Break],
            MarkerKind::TagStart => &[OpenTag],
            MarkerKind::TagEnd => &[CloseTag],
        }
    }
}

/// Filter types as written in descriptors (`SKIP`, `REPLACE`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    Skip,
    Include,
    Output,
    OutputStart,
    OutputStop,
    SentenceBreak,
    Space,
    Replace,
    Start,
    Stop,
    Tag,
}

impl FilterType {
    pub const ALL: [FilterType; 11] = [
        FilterType::Skip,
        FilterType::Include,
        FilterType::Output,
        FilterType::OutputStart,
        FilterType::OutputStop,
        FilterType::SentenceBreak,
        FilterType::Space,
        FilterType::Replace,
        FilterType::Start,
        FilterType::Stop,
        FilterType::Tag,
    ];

    /// Marker kinds emitted at the start of a match
    pub fn start_markers(self) -> &'static [MarkerKind] {
        use MarkerKind::*;
        match self {
            FilterType::Skip => &[PushSkip],
            FilterType::Include => &[PushInclude],
            FilterType::Output => &[PushOutput, PushSkip],
            FilterType::OutputStart => &[StartOutput],
            FilterType::OutputStop => &[],
            FilterType::SentenceBreak => &[SentenceBreak],
            FilterType::Space => &[Space, PushSkip],
            FilterType::Replace => &[Insert, PushSkip],
            FilterType::Start => &[],
            FilterType::Stop => &[Stop],
            FilterType::Tag => &[TagStart],
        }
    }

    /// Marker kinds emitted at the end of a match
    pub fn end_markers(self) -> &'static [MarkerKind] {
        use MarkerKind::*;
        match self {
            FilterType::Skip | FilterType::Space | FilterType::Replace => &[PopSkip],
            FilterType::Include => &[PopInclude],
            // PopOutput rather than StopOutput keeps the output stack balanced
            FilterType::Output => &[PopOutput, PopSkip],
            FilterType::OutputStart => &[],
            FilterType::OutputStop => &[StopOutput],
            FilterType::SentenceBreak => &[],
            FilterType::Start => &[Start],
            FilterType::Stop => &[],
            FilterType::Tag => &[TagEnd],
        }
    }

    pub fn markers(self, direction: Direction) -> &'static [MarkerKind] {
        match direction {
            Direction::Start => self.start_markers(),
            Direction::End => self.end_markers(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::Skip => "SKIP",
            FilterType::Include => "INCLUDE",
            FilterType::Output => "OUTPUT",
            FilterType::OutputStart => "OUTPUT_START",
            FilterType::OutputStop => "OUTPUT_STOP",
            FilterType::SentenceBreak => "SENTENCE_BREAK",
            FilterType::Space => "SPACE",
            FilterType::Replace => "REPLACE",
            FilterType::Start => "START",
            FilterType::Stop => "STOP",
            FilterType::Tag => "TAG",
        }
    }
}

impl FromStr for FilterType {
    type Err = RawTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| RawTextError::UnknownFilterType(s.to_string()))
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a tag attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AttributeValue(pub String);

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute/value pair attached to TagStart/TagEnd markers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagLabel {
    pub attribute: String,
    pub value: AttributeValue,
}

impl TagLabel {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: AttributeValue(value.into()),
        }
    }
}

/// A typed instruction anchored at a byte position in a raw chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub direction: Direction,
    /// Byte offset into the raw chunk being interpreted
    pub position: usize,
    pub source: FilterId,
    pub match_text: String,
    pub insertion_text: Option<String>,
    pub tag: Option<TagLabel>,
}

impl Marker {
    /// Bare marker with no payload, mostly useful for hand-built marker streams
    pub fn new(kind: MarkerKind, direction: Direction, position: usize) -> Self {
        Self {
            kind,
            direction,
            position,
            source: FilterId::default(),
            match_text: String::new(),
            insertion_text: None,
            tag: None,
        }
    }

    pub fn with_insertion(mut self, text: impl Into<String>) -> Self {
        self.insertion_text = Some(text.into());
        self
    }

    pub fn with_tag(mut self, tag: TagLabel) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_source(mut self, source: FilterId) -> Self {
        self.source = source;
        self
    }
}

/// Put markers in replay order: by position, starts before ends, then filter
/// declaration order. The sort is stable so match order survives within a filter.
pub fn sort_markers(markers: &mut [Marker]) {
    markers.sort_by_key(|m| (m.position, m.direction, m.source));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_output_tables() {
        assert_eq!(
            FilterType::Replace.start_markers(),
            &[MarkerKind::Insert, MarkerKind::PushSkip]
        );
        assert_eq!(FilterType::Replace.end_markers(), &[MarkerKind::PopSkip]);
        assert_eq!(
            FilterType::Output.start_markers(),
            &[MarkerKind::PushOutput, MarkerKind::PushSkip]
        );
        assert_eq!(
            FilterType::Output.end_markers(),
            &[MarkerKind::PopOutput, MarkerKind::PopSkip]
        );
        assert_eq!(FilterType::Tag.markers(Direction::End), &[MarkerKind::TagEnd]);
    }

    #[test]
    fn test_push_and_pop_counts_balance_for_every_filter_type() {
        // WHY: a well-formed match must leave both stacks at their original depth
        for filter_type in FilterType::ALL {
            let mut depth = [0i32; 2];
            for kind in filter_type
                .start_markers()
                .iter()
                .chain(filter_type.end_markers())
            {
                for effect in kind.effects() {
                    match effect {
                        Effect::Push(Stack::Process, _) => depth[0] += 1,
                        Effect::Push(Stack::Output, _) => depth[1] += 1,
                        Effect::Pop(Stack::Process) => depth[0] -= 1,
                        Effect::Pop(Stack::Output) => depth[1] -= 1,
                        _ => {}
                    }
                }
            }
            assert_eq!(depth, [0, 0], "{filter_type} leaves the stacks unbalanced");
        }
    }

    #[test]
    fn test_filter_type_parsing() {
        assert_eq!("SENTENCE_BREAK".parse::<FilterType>().unwrap(), FilterType::SentenceBreak);
        assert_eq!(" OUTPUT_STOP".parse::<FilterType>().unwrap(), FilterType::OutputStop);
        assert!(matches!(
            "NO_SUCH_TYPE".parse::<FilterType>(),
            Err(RawTextError::UnknownFilterType(_))
        ));
    }

    #[test]
    fn test_starts_precede_ends_at_same_position() {
        let mut markers = vec![
            Marker::new(MarkerKind::PopSkip, Direction::End, 4).with_source(FilterId(0)),
            Marker::new(MarkerKind::Insert, Direction::Start, 4).with_source(FilterId(1)),
            Marker::new(MarkerKind::PushSkip, Direction::Start, 4).with_source(FilterId(1)),
            Marker::new(MarkerKind::PushSkip, Direction::Start, 2).with_source(FilterId(2)),
            Marker::new(MarkerKind::TagStart, Direction::Start, 4).with_source(FilterId(0)),
        ];
        sort_markers(&mut markers);
        let kinds: Vec<_> = markers.iter().map(|m| (m.position, m.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, MarkerKind::PushSkip),
                (4, MarkerKind::TagStart),
                (4, MarkerKind::Insert),
                (4, MarkerKind::PushSkip),
                (4, MarkerKind::PopSkip),
            ]
        );
    }
}
