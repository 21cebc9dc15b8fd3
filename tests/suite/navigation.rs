//! Focus and circular navigation over the canonical order.

use sbtdiag_monitor::Severity;

use crate::common::{FAILED_COMPILE, FAILED_TEST, PARTIAL_FIX, Recorded};

fn loaded() -> Recorded {
    let mut recorded = Recorded::new();
    recorded.session.feed(FAILED_COMPILE.as_bytes());
    recorded.session.feed(FAILED_TEST.as_bytes());
    recorded
}

#[test]
fn test_next_wraps_after_n_plus_one_calls() {
    let recorded = loaded();
    let store = recorded.session.store();
    let n = store.all().len();
    assert_eq!(n, 3);

    let first = store.next().unwrap();
    for _ in 0..n - 1 {
        store.next();
    }
    let wrapped = store.next().unwrap();
    assert_eq!(wrapped.sequence_id(), first.sequence_id());
}

#[test]
fn test_navigation_follows_canonical_order() {
    let recorded = loaded();
    let store = recorded.session.store();
    let order: Vec<String> = (0..3)
        .map(|_| store.next().unwrap().file_path().to_string())
        .collect();
    assert_eq!(
        order,
        vec![
            "/proj/src/main/scala/Calc.scala",
            "/proj/src/main/scala/Main.scala",
            "CalcSpec.scala",
        ]
    );
}

#[test]
fn test_previous_mirrors_next() {
    let recorded = loaded();
    let store = recorded.session.store();
    let last = store.previous().unwrap();
    assert_eq!(last.severity(), Severity::TestFailure);
    let before = store.previous().unwrap();
    assert_eq!(before.file_path(), "/proj/src/main/scala/Main.scala");
    assert_eq!(store.next().unwrap().sequence_id(), last.sequence_id());
}

#[test]
fn test_new_build_output_resets_focus() {
    let mut recorded = loaded();
    let store = recorded.session.store();
    store.next();
    assert!(store.focused().is_some());

    recorded.session.feed(PARTIAL_FIX.as_bytes());
    assert!(store.focused().is_none());
}

#[test]
fn test_focus_by_diagnostic() {
    let recorded = loaded();
    let store = recorded.session.store();
    let target = store.diagnostics_at("/proj/src/main/scala/Main.scala", 7).remove(0);

    assert!(store.focus(&target));
    let after = store.next().unwrap();
    assert_eq!(after.severity(), Severity::TestFailure);
}

#[test]
fn test_empty_store_navigation() {
    let recorded = Recorded::new();
    let store = recorded.session.store();
    assert!(store.next().is_none());
    assert!(store.focused().is_none());
}
