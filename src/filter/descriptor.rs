//! Filter descriptor grammar.
//!
//! One filter per line, tab separated:
//!
//! ```text
//! RegexMarkerFilter<TAB>TYPE1,TYPE2<TAB>regex[<TAB>group][<TAB>replacement-or-tag]
//! DuplicateWhiteSpaceFilter
//! ```
//!
//! REPLACE needs a replacement and TAG needs `attribute=value` (or a bare
//! attribute, whose value is then empty). Blank lines and `#` comments are skipped.

use tracing::debug;

use crate::error::{RawTextError, Result};
use crate::filter::RegexFilter;
use crate::marker::{FilterId, FilterType, TagLabel};

const REGEX_FILTER: &str = "RegexMarkerFilter";

/// Named filters that need no arguments
const BUILT_INS: [(&str, &[FilterType], &str, usize); 3] = [
    // every blank after the first in a run
    ("DuplicateWhiteSpaceFilter", &[FilterType::Skip], "[ \t]([ \t]+)", 1),
    (
        "NewlineEndOfSentenceMarker",
        &[FilterType::SentenceBreak, FilterType::Skip],
        "\r\n|[\r\n]",
        0,
    ),
    ("NewlineSpaceMarker", &[FilterType::Space], "\r\n|[\r\n]", 0),
];

/// Parse every descriptor line, assigning filter ids in declaration order
/// starting at `first_id`
pub fn parse_descriptors(text: &str, first_id: usize, block_size: usize) -> Result<Vec<RegexFilter>> {
    let mut filters = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        let id = FilterId(first_id + filters.len());
        filters.push(parse_descriptor(trimmed, line_index + 1, id, block_size)?);
    }
    debug!(count = filters.len(), "Parsed filter descriptors");
    Ok(filters)
}

/// Parse a single descriptor. `line` is only used in error messages.
pub fn parse_descriptor(descriptor: &str, line: usize, id: FilterId, block_size: usize) -> Result<RegexFilter> {
    let parts: Vec<&str> = descriptor.split('\t').collect();
    let name = parts[0].trim();

    if name != REGEX_FILTER {
        let (_, types, pattern, group) = BUILT_INS
            .iter()
            .find(|(builtin, ..)| *builtin == name)
            .ok_or_else(|| RawTextError::UnknownFilter(name.to_string()))?;
        return RegexFilter::new(id, types.to_vec(), pattern, block_size)?
            .with_group(*group)
            .map(|f| f.with_name(name));
    }

    let invalid = |reason: String| RawTextError::InvalidDescriptor { line, reason };

    let type_list = parts
        .get(1)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid("missing filter types".to_string()))?;
    let filter_types = type_list
        .split(',')
        .map(str::parse)
        .collect::<Result<Vec<FilterType>>>()?;

    let needs_replacement = filter_types.contains(&FilterType::Replace);
    let needs_tag = filter_types.contains(&FilterType::Tag);
    if needs_replacement && needs_tag {
        return Err(invalid("REPLACE and TAG cannot be combined".to_string()));
    }
    let min_params = if needs_replacement || needs_tag { 4 } else { 3 };

    let (group, argument) = if parts.len() == min_params + 1 {
        let group = parts[3]
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(format!("bad group index {:?}: {e}", parts[3])))?;
        (group, parts.get(4).copied())
    } else if parts.len() == min_params {
        (0, parts.get(3).copied())
    } else {
        return Err(invalid(format!(
            "wrong number of arguments for {REGEX_FILTER}: expected {} or {}, but was {}",
            min_params,
            min_params + 1,
            parts.len()
        )));
    };

    let mut filter = RegexFilter::new(id, filter_types, parts[2], block_size)?.with_group(group)?;
    if needs_replacement {
        filter = filter.with_replacement(argument.unwrap_or_default());
    }
    if needs_tag {
        let argument = argument.unwrap_or_default();
        let tag = match argument.split_once('=') {
            Some((attribute, value)) => TagLabel::new(attribute, value),
            None => TagLabel::new(argument, ""),
        };
        filter = filter.with_tag(tag);
    }
    Ok(filter)
}
