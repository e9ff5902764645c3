// End-to-end behaviour of the engine on small, fully worked inputs
// WHY: each case pins one observable contract: cleanup, skipping, replacement provenance, deferred breaks

use rawsplit::{ProcessorConfig, RegionInterpreter};

#[path = "integration/mod.rs"]
mod test_utils;
use test_utils::{chunk, filters, stream_sentences, texts, window_sentences};

const SENTENCE_ON_BLANK_LINE: &str = "DuplicateWhiteSpaceFilter\nRegexMarkerFilter\tSENTENCE_BREAK,SKIP\t\\n\\n";

#[test]
fn test_blank_line_ends_sentence_and_spaces_collapse() {
    let input = "Hello   world.\n\nGoodbye.";
    let sentences = window_sentences(&[input], SENTENCE_ON_BLANK_LINE);
    assert_eq!(texts(&sentences), vec!["Hello world.", "Goodbye."]);
    assert!(sentences.iter().all(|s| s.is_complete()));

    let goodbye = &sentences[1];
    assert_eq!(goodbye.original_start(), Some("Hello   world.\n\n".len()));
    assert_eq!(goodbye.line_number(goodbye.original_start().unwrap()), Some(3));
    assert_eq!(goodbye.column_number(goodbye.original_start().unwrap()), Some(0));

    let world = &sentences[0];
    assert_eq!(world.original_index(5), Some(5));
    assert_eq!(world.original_index(6), Some("Hello   ".len()), "skipped blanks leave the trace");
}

#[test]
fn test_skipped_note_leaves_no_trace_in_processed_text() {
    let raw = "Keep <note>drop this</note> text.";
    let skip = filters("RegexMarkerFilter\tSKIP\t<note>.*?</note>");
    let markers = skip[0].apply("", raw, "").unwrap();
    let mut interpreter = RegionInterpreter::new(&ProcessorConfig::default()).unwrap();
    let holder = interpreter.process(raw, &markers, true).unwrap();

    assert_eq!(holder.processed_text(), "Keep  text.");
    assert_eq!(holder.original_indexes().len(), holder.len());
    let note = "Keep ".len().."Keep <note>drop this</note>".len();
    assert!(holder.original_indexes().iter().all(|i| !note.contains(i)));
    assert!(holder.original_text_segments().is_empty());
}

#[test]
fn test_output_note_is_echoed_as_raw_segment() {
    let raw = "Keep <note>drop this</note> text.";
    let output = filters("RegexMarkerFilter\tOUTPUT\t<note>.*?</note>");
    let markers = output[0].apply("", raw, "").unwrap();
    let mut interpreter = RegionInterpreter::new(&ProcessorConfig::default()).unwrap();
    let holder = interpreter.process(raw, &markers, true).unwrap();
    assert_eq!(holder.processed_text(), "Keep  text.");
    assert_eq!(
        holder.original_text_segments().get(&5).map(String::as_str),
        Some("<note>drop this</note>")
    );

    let sentences = window_sentences(&[raw], "RegexMarkerFilter\tOUTPUT\t<note>.*?</note>");
    assert_eq!(texts(&sentences), vec!["Keep text."]);
    assert_eq!(sentences[0].preceding_raw_segment(5), Some("<note>drop this</note>"));
}

#[test]
fn test_replacement_maps_to_replaced_character() {
    let sentences = window_sentences(&["Un café noir."], "RegexMarkerFilter\tREPLACE\té\te");
    assert_eq!(texts(&sentences), vec!["Un cafe noir."]);
    let s = &sentences[0];
    assert_eq!(s.original_index(6), Some("Un caf".len()), "inserted e maps to the é it replaced");
    assert_eq!(s.original_index(7), Some("Un café".len()));
    assert_eq!(s.index_of("Un caf".len()), 6);
}

#[test]
fn test_break_at_chunk_end_is_deferred_to_next_chunk() {
    let breaks = filters("RegexMarkerFilter\tSENTENCE_BREAK,SKIP\t<br/>");
    assert!(breaks[0].apply("", "First sentence", "<br/>Second one.").unwrap().is_empty());
    let markers = breaks[0].apply("First sentence", "<br/>Second one.", "").unwrap();
    assert_eq!(markers.first().map(|m| m.position), Some(0));

    let sentences = window_sentences(
        &["First sentence", "<br/>Second one."],
        "RegexMarkerFilter\tSENTENCE_BREAK,SKIP\t<br/>",
    );
    assert_eq!(texts(&sentences), vec!["First sentence", "Second one."]);
    assert!(sentences.iter().all(|s| s.is_complete()));
}

#[test]
fn test_skip_end_on_chunk_edge_waits_for_next_chunk() {
    let skip = filters("RegexMarkerFilter\tSKIP\t<b>");
    let markers = skip[0].apply("", "ab<b>", "cd").unwrap();
    assert_eq!(markers.len(), 1, "only the push belongs to this chunk");
    let markers = skip[0].apply("ab<b>", "cd", "").unwrap();
    assert_eq!(markers.len(), 1, "the pop is reported at the start of the next chunk");
    assert_eq!(markers[0].position, 0);

    let markers = skip[0].apply("", "ab<b>", "").unwrap();
    assert_eq!(markers.len(), 2, "with no more input the end is flushed");
}

#[test]
fn test_one_chunk_and_many_chunks_agree() {
    let input = "Alpha  beta.\n\nGamma\tdelta  epsilon.\n\n\nZeta <skip>eta</skip> theta.\n\nLast";
    let descriptors = format!("{SENTENCE_ON_BLANK_LINE}\nRegexMarkerFilter\tSKIP\t<skip>.*?</skip>");
    let whole = texts(&window_sentences(&[input], &descriptors));
    assert_eq!(
        whole,
        vec!["Alpha beta.", "Gamma\tdelta epsilon.", "Zeta theta.", "Last"]
    );

    // chunks are never shorter than the longest match, as with block_size chunking
    for sizes in [vec![16], vec![17, 23], vec![20, 16, 31], vec![64]] {
        let chunks = chunk(input, &sizes);
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        assert_eq!(texts(&window_sentences(&chunk_refs, &descriptors)), whole, "chunk sizes {sizes:?}");
    }
    assert_eq!(texts(&stream_sentences(input, 16, &descriptors)), whole);
}

#[test]
fn test_tiny_chunks_agree_for_single_character_breaks() {
    let input = "One  two.\nThree\n\nfour  five.\nsix";
    let descriptors = "DuplicateWhiteSpaceFilter\nNewlineEndOfSentenceMarker";
    let whole = texts(&window_sentences(&[input], descriptors));
    assert_eq!(whole, vec!["One two.", "Three", "four five.", "six"]);

    for sizes in [vec![1], vec![2], vec![3, 1]] {
        let chunks = chunk(input, &sizes);
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        assert_eq!(texts(&window_sentences(&chunk_refs, descriptors)), whole, "chunk sizes {sizes:?}");
    }
}

#[test]
fn test_whitespace_only_input_yields_nothing() {
    assert!(window_sentences(&["   \n\n  \t "], SENTENCE_ON_BLANK_LINE).is_empty());
    assert!(window_sentences(&[], SENTENCE_ON_BLANK_LINE).is_empty());
}
