// Configuration loading and the errors it must surface before any text is read

use rawsplit::{parse_descriptors, ProcessorConfig, RawTextError, SentenceStream};

#[path = "integration/mod.rs"]
mod test_utils;
use test_utils::{texts, TestFixture};

#[test]
fn test_config_file_with_relative_filter_file() {
    let fixture = TestFixture::new();
    fixture.create_file(
        "filters/markup.filters",
        "# markup\nRegexMarkerFilter\tSKIP\t<[^>]+>\n\nNewlineEndOfSentenceMarker\n",
    );
    let config_path = fixture.create_file(
        "rawsplit.toml",
        "block_size = 64\nfilters = [\"DuplicateWhiteSpaceFilter\"]\nfilter_files = [\"filters/markup.filters\"]\n",
    );

    let config = ProcessorConfig::load(&config_path).expect("Config should load");
    assert_eq!(config.block_size, 64);
    assert_eq!(config.filter_files, vec![fixture.root_path.join("filters/markup.filters")]);

    let filters = config.build_filters().expect("Filters should build");
    let names: Vec<_> = filters.iter().map(|f| (f.id().0, f.name().to_string())).collect();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0], (0, "DuplicateWhiteSpaceFilter".to_string()));
    assert_eq!(names[2], (2, "NewlineEndOfSentenceMarker".to_string()));

    let input = "A <b>bold</b>   claim.\nNext one.";
    let sentences: Vec<_> = SentenceStream::new(input.as_bytes(), filters, &config)
        .unwrap()
        .collect::<rawsplit::Result<_>>()
        .unwrap();
    assert_eq!(texts(&sentences), vec!["A bold claim.", "Next one."]);
}

#[test]
fn test_missing_filter_file_is_io_error() {
    let config = ProcessorConfig {
        filter_files: vec!["does/not/exist.filters".into()],
        ..ProcessorConfig::default()
    };
    assert!(matches!(config.build_filters(), Err(RawTextError::Io(_))));
}

#[test]
fn test_descriptor_errors_fail_fast() {
    assert!(matches!(
        parse_descriptors("NoSuchFilter", 0, 1000),
        Err(RawTextError::UnknownFilter(name)) if name == "NoSuchFilter"
    ));
    assert!(matches!(
        parse_descriptors("RegexMarkerFilter\tSKIP,BOGUS\tx", 0, 1000),
        Err(RawTextError::UnknownFilterType(_))
    ));
    assert!(matches!(
        parse_descriptors("RegexMarkerFilter\tREPLACE\tx", 0, 1000),
        Err(RawTextError::InvalidDescriptor { line: 1, .. })
    ));
    assert!(matches!(
        parse_descriptors("\nRegexMarkerFilter\tSKIP\tx\t0\textra\tmore", 0, 1000),
        Err(RawTextError::InvalidDescriptor { line: 2, .. })
    ));
    assert!(matches!(
        parse_descriptors("RegexMarkerFilter\tSKIP\t(unclosed", 0, 1000),
        Err(RawTextError::InvalidRegex { .. })
    ));
    assert!(matches!(
        parse_descriptors("RegexMarkerFilter\tSKIP\ta(b)\t3", 0, 1000),
        Err(RawTextError::InvalidGroupIndex { group: 3, .. })
    ));
}

#[test]
fn test_match_longer_than_block_size_stops_the_stream() {
    let config = ProcessorConfig {
        block_size: 8,
        ..ProcessorConfig::default()
    };
    let filters = parse_descriptors("RegexMarkerFilter\tSKIP\t<[^>]*>", 0, 8).unwrap();
    let input = "ok <abcdefghijk> text";
    let results: Vec<_> = SentenceStream::new(input.as_bytes(), filters, &config)
        .unwrap()
        .collect();
    let err = results
        .into_iter()
        .find_map(Result::err)
        .expect("Oversized match should be an error");
    assert!(err.to_string().contains("bigger than block size"));
    assert!(matches!(err, RawTextError::MatchExceedsBlockSize { block_size: 8, .. }));
}
