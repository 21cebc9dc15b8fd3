//! Shared test utilities and fixtures
//!
//! Sample sbt transcripts and a session wrapper that records hook calls.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sbtdiag_monitor::{BuildOutcome, BuildSession, Diagnostic, RootResolver, Severity};

/// A failed compile with two errors, one of them multi-line.
pub const FAILED_COMPILE: &str = "\
[info] Loading project definition from /proj/project
[info] Set current project to calc (in build file:/proj/)
[info] Compiling 2 Scala sources to /proj/target/scala-2.10/classes...
[error] /proj/src/main/scala/Calc.scala:3: not found: value x
[error]     x + 1
[error]     ^
[error] /proj/src/main/scala/Main.scala:7: type mismatch;
[error]  found   : Int(1)
[error]  required: String
[error]     greet(1)
[error]           ^
[error] two errors found
[error] (compile:compile) Compilation failed
[error] Total time: 2 s, completed Mar 3, 2013 1:00:00 PM
";

/// The same project after fixing `Main.scala`, with a warning left over.
pub const PARTIAL_FIX: &str = "\
[info] Compiling 1 Scala source to /proj/target/scala-2.10/classes...
[warn] /proj/src/main/scala/Main.scala:9: method old in object Util is deprecated
[warn]     Util.old()
[warn]          ^
[warn] one warning found
[error] Total time: 1 s, completed Mar 3, 2013 1:02:00 PM
";

/// A test run with one failing assertion.
pub const FAILED_TEST: &str = "\
[info] Compiling 1 Scala source to /proj/target/scala-2.10/test-classes...
[info] CalcSpec:
[info] - should add
[info] - should subtract *** FAILED *** (CalcSpec.scala:14)
[info]   3 did not equal 4
[error] Failed: Total 2, Failed 1, Errors 0, Passed 1
[error] Total time: 3 s, completed Mar 3, 2013 1:05:00 PM
";

/// A clean build.
pub const SUCCESS: &str = "\
[info] Compiling 2 Scala sources to /proj/target/scala-2.10/classes...
[success] Total time: 2 s, completed Mar 3, 2013 1:10:00 PM
";

/// Hook call, as observed by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    Diagnostic(String, u32),
    Finished(BuildOutcome),
}

/// A session rooted at `/proj` whose hooks append to a shared log.
pub struct Recorded {
    pub session: BuildSession,
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl Recorded {
    pub fn new() -> Self {
        let mut session = BuildSession::new(Arc::new(RootResolver::new("/proj")));
        let events = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&events);
        session.on_build_started(move || log.lock().unwrap().push(Event::Started));
        let log = Arc::clone(&events);
        session.on_diagnostic(move |d| {
            log.lock()
                .unwrap()
                .push(Event::Diagnostic(d.file_path().to_string(), d.line()));
        });
        let log = Arc::clone(&events);
        session.on_build_finished(move |o| log.lock().unwrap().push(Event::Finished(o)));

        Self { session, events }
    }

    /// Feed `input` split into the given chunks, then end the stream.
    pub fn feed_chunks(&mut self, chunks: &[&[u8]]) {
        for chunk in chunks {
            self.session.feed(chunk);
        }
        self.session.finish();
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

/// Comparable projection of a diagnostic, without its sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    pub severity: Severity,
    pub detail: Vec<String>,
}

pub fn shapes(diagnostics: &[Diagnostic]) -> Vec<Shape> {
    diagnostics
        .iter()
        .map(|d| Shape {
            file: d.file_path().to_string(),
            line: d.line(),
            column: d.column(),
            severity: d.severity(),
            detail: d.detail_lines().to_vec(),
        })
        .collect()
}
