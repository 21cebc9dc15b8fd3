//! Chunk-boundary invariance: where the pipe happens to split the output
//! must not change what gets parsed.

use crate::common::{FAILED_COMPILE, FAILED_TEST, PARTIAL_FIX, Recorded, shapes};

fn parse_whole(input: &[u8]) -> Recorded {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[input]);
    recorded
}

fn assert_same_at_every_split(input: &str) {
    let bytes = input.as_bytes();
    let whole = parse_whole(bytes);
    let expected = shapes(&whole.session.store().all());
    let expected_events = whole.events();
    assert!(!expected_events.is_empty());

    for cut in 0..=bytes.len() {
        let mut split = Recorded::new();
        split.feed_chunks(&[&bytes[..cut], &bytes[cut..]]);
        assert_eq!(shapes(&split.session.store().all()), expected, "cut at {cut}");
        assert_eq!(split.events(), expected_events, "cut at {cut}");
    }
}

#[test]
fn test_failed_compile_is_split_invariant() {
    assert_same_at_every_split(FAILED_COMPILE);
}

#[test]
fn test_warning_block_is_split_invariant() {
    assert_same_at_every_split(PARTIAL_FIX);
}

#[test]
fn test_test_failure_is_split_invariant() {
    assert_same_at_every_split(FAILED_TEST);
}

#[test]
fn test_crlf_and_color_codes_are_split_invariant() {
    let input = FAILED_COMPILE
        .replace('\n', "\r\n")
        .replace("[error]", "[\x1b[31merror\x1b[0m]");
    assert_same_at_every_split(&input);

    // Same diagnostics as the plain LF transcript.
    let plain = parse_whole(FAILED_COMPILE.as_bytes());
    let decorated = parse_whole(input.as_bytes());
    assert_eq!(
        shapes(&decorated.session.store().all()),
        shapes(&plain.session.store().all())
    );
}

#[test]
fn test_byte_at_a_time() {
    let bytes = FAILED_COMPILE.as_bytes();
    let whole = parse_whole(bytes);

    let mut trickle = Recorded::new();
    let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
    trickle.feed_chunks(&chunks);

    assert_eq!(
        shapes(&trickle.session.store().all()),
        shapes(&whole.session.store().all())
    );
    assert_eq!(trickle.events(), whole.events());
}
