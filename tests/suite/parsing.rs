//! End-to-end parsing of sbt transcripts.

use sbtdiag_monitor::{BuildOutcome, Severity};

use crate::common::{Event, FAILED_COMPILE, FAILED_TEST, Recorded, SUCCESS, Shape, shapes};

#[test]
fn test_block_boundary_keeps_terminating_line() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[b"[error] a.scala:1: msg\n[error]   detail\n[info] Compiling 1 Scala source\n"]);

    let all = recorded.session.store().all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].line(), 1);
    assert!(all[0].detail_lines().iter().any(|l| l.contains("detail")));
    assert_eq!(
        recorded.events(),
        vec![Event::Diagnostic("a.scala".into(), 1), Event::Started]
    );
}

#[test]
fn test_caret_sets_column() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[b"[error] x.scala:3: bad\n[error] val y = 1\n[error]       ^\n"]);

    let all = recorded.session.store().all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].line(), 3);
    assert_eq!(all[0].column(), Some(7));
}

#[test]
fn test_failed_compile_transcript() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[FAILED_COMPILE.as_bytes()]);

    assert_eq!(
        shapes(&recorded.session.store().all()),
        vec![
            Shape {
                file: "/proj/src/main/scala/Calc.scala".into(),
                line: 3,
                column: Some(5),
                severity: Severity::Error,
                detail: vec!["not found: value x".into(), "    x + 1".into(), "    ^".into()],
            },
            Shape {
                file: "/proj/src/main/scala/Main.scala".into(),
                line: 7,
                column: Some(11),
                severity: Severity::Error,
                detail: vec![
                    "type mismatch;".into(),
                    " found   : Int(1)".into(),
                    " required: String".into(),
                    "    greet(1)".into(),
                    "          ^".into(),
                ],
            },
        ]
    );
    assert_eq!(
        recorded.events(),
        vec![
            Event::Started,
            Event::Diagnostic("/proj/src/main/scala/Calc.scala".into(), 3),
            Event::Diagnostic("/proj/src/main/scala/Main.scala".into(), 7),
            Event::Finished(BuildOutcome::Failure),
        ]
    );
}

#[test]
fn test_failed_test_transcript() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[FAILED_TEST.as_bytes()]);

    let all = recorded.session.store().all();
    assert_eq!(all.len(), 1);
    let failure = &all[0];
    assert_eq!(failure.severity(), Severity::TestFailure);
    assert_eq!(failure.file_path(), "CalcSpec.scala");
    assert_eq!(failure.line(), 14);
    assert_eq!(failure.column(), None);
    assert_eq!(failure.summary(), "- should subtract *** FAILED ***");
    assert_eq!(
        failure.full_text("CalcSpec.scala"),
        " -- Test Failure --\n- should subtract *** FAILED *** (CalcSpec.scala:14)"
    );
}

#[test]
fn test_success_transcript_has_no_diagnostics() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[SUCCESS.as_bytes()]);

    assert!(!recorded.session.store().has_any());
    assert_eq!(
        recorded.events(),
        vec![Event::Started, Event::Finished(BuildOutcome::Success)]
    );
}

#[test]
fn test_malformed_headers_are_ignored() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[
        b"[error] A.scala:abc: not a line number\n\
          [error] B.scala:99999999999: overflows\n\
          [warn] no location here\n\
          garbage \x1b[31 unterminated escape\n",
    ]);
    assert!(!recorded.session.store().has_any());
    assert!(recorded.events().is_empty());
}

#[test]
fn test_full_text_of_multiline_error() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[FAILED_COMPILE.as_bytes()]);
    let store = recorded.session.store();
    let main = store.diagnostics_at("/proj/src/main/scala/Main.scala", 7);
    assert_eq!(main.len(), 1);
    assert_eq!(
        main[0].full_text("src/main/scala/Main.scala"),
        " -- Error --\n\
         src/main/scala/Main.scala:7: type mismatch;\n \
         found   : Int(1)\n \
         required: String\n    \
         greet(1)\n          \
         ^"
    );
}

#[test]
fn test_unterminated_tail_is_flushed_on_finish() {
    let mut recorded = Recorded::new();
    recorded.feed_chunks(&[b"[warn] A.scala:5: careful\n[warn]   A.thing"]);
    let all = recorded.session.store().all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].detail_lines(), ["careful", "  A.thing"]);
}
