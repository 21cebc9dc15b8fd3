//! Output parser: turns logical sbt console lines into diagnostics and
//! build lifecycle events.
//!
//! sbt interleaves progress lines with multi-line compiler messages and never
//! marks the end of a message explicitly. A message ends either at its caret
//! line (`[error]     ^`) or at the first line that cannot continue it; that
//! line is then classified afresh so it is never lost.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::types::{BuildOutcome, ParsedDiagnostic, Severity};

/// Something the parser recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    /// A compile pass started (`[info] Compiling ...`).
    BuildStarted,
    /// A complete diagnostic.
    Diagnostic(ParsedDiagnostic),
    /// A build pass ended (`[success|error] Total time: ...`).
    BuildFinished(BuildOutcome),
}

struct Patterns {
    build_started: Regex,
    header: Regex,
    test_failure: Regex,
    build_succeeded: Regex,
    build_failed: Regex,
    continuation: Regex,
    caret: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            build_started: Regex::new(r"^\[info\] Compiling").expect("valid build start regex"),
            header: Regex::new(r"^\[(error|warn)\]\s+([^:]+):(\d+):\s+(.+)$")
                .expect("valid diagnostic header regex"),
            test_failure: Regex::new(r"^\[(?:error|info)\]\s+(.+)\s+\(([^:]+):(\d+)\)$")
                .expect("valid test failure regex"),
            build_succeeded: Regex::new(r"^\[success\] Total time:")
                .expect("valid build success regex"),
            build_failed: Regex::new(r"^\[error\] Total time:").expect("valid build failure regex"),
            continuation: Regex::new(r"^\[(?:error|warn)\] ?(.*)$")
                .expect("valid continuation regex"),
            caret: Regex::new(r"^(\s*)\^\s*$").expect("valid caret regex"),
        }
    }
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::new)
}

/// Classification of a line seen while no diagnostic is open, in rule
/// priority order.
#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    BuildStarted,
    Header {
        severity: Severity,
        path: &'a str,
        line: u32,
        message: &'a str,
    },
    TestFailure {
        path: &'a str,
        line: u32,
        message: &'a str,
    },
    BuildFinished(BuildOutcome),
    Other,
}

impl LineKind<'_> {
    /// Lines that open or close something and therefore end an open
    /// diagnostic even when they carry an `[error]`/`[warn]` prefix.
    fn is_boundary(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A line number the tool printed. Overflowing values do not match.
fn line_number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn classify(line: &str) -> LineKind<'_> {
    let p = patterns();

    if p.build_started.is_match(line) {
        return LineKind::BuildStarted;
    }

    if let Some(caps) = p.header.captures(line)
        && let Some(number) = line_number(&caps, 3)
        && let Some(severity) = Severity::from_tag(&caps[1])
    {
        return LineKind::Header {
            severity,
            path: caps.get(2).map_or("", |m| m.as_str()),
            line: number,
            message: caps.get(4).map_or("", |m| m.as_str()),
        };
    }

    if let Some(caps) = p.test_failure.captures(line)
        && let Some(number) = line_number(&caps, 3)
    {
        return LineKind::TestFailure {
            path: caps.get(2).map_or("", |m| m.as_str()),
            line: number,
            message: caps.get(1).map_or("", |m| m.as_str()),
        };
    }

    if p.build_succeeded.is_match(line) {
        return LineKind::BuildFinished(BuildOutcome::Success);
    }
    if p.build_failed.is_match(line) {
        return LineKind::BuildFinished(BuildOutcome::Failure);
    }

    LineKind::Other
}

/// What a line means for the diagnostic currently being accumulated.
#[derive(Debug, PartialEq, Eq)]
enum Continuation<'a> {
    /// Caret line; carries the stripped text and the 1-based column.
    Caret(&'a str, u32),
    /// Another line of detail, marker stripped.
    Detail(&'a str),
    /// Not part of the diagnostic.
    End,
}

fn continuation(line: &str) -> Continuation<'_> {
    if classify(line).is_boundary() {
        return Continuation::End;
    }
    let p = patterns();
    let Some(rest) = p
        .continuation
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return Continuation::End;
    };
    match p.caret.captures(rest).and_then(|caps| caps.get(1)) {
        Some(indent) => Continuation::Caret(rest, indent.as_str().chars().count() as u32 + 1),
        None => Continuation::Detail(rest),
    }
}

#[derive(Debug, Default)]
enum ParserState {
    #[default]
    Idle,
    InError(ParsedDiagnostic),
}

/// Line-at-a-time state machine over sbt output.
///
/// Never fails: lines it does not understand are ignored.
#[derive(Debug, Default)]
pub struct OutputParser {
    state: ParserState,
}

impl OutputParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no diagnostic is currently being accumulated.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ParserState::Idle)
    }

    /// Process one logical line, appending any resulting events to `out`.
    pub fn push_line(&mut self, line: &str, out: &mut Vec<ParserEvent>) {
        if let ParserState::InError(pending) = &mut self.state {
            match continuation(line) {
                Continuation::Caret(text, column) => {
                    pending.detail_lines.push(text.to_string());
                    pending.column = Some(column);
                    self.finalize(out);
                    return;
                }
                Continuation::Detail(text) => {
                    pending.detail_lines.push(text.to_string());
                    return;
                }
                Continuation::End => {
                    self.finalize(out);
                    tracing::trace!(line, "Diagnostic ended; re-dispatching line");
                }
            }
        }
        self.dispatch_idle(line, out);
    }

    /// End of input: emit a diagnostic that is still open.
    pub fn finish(&mut self, out: &mut Vec<ParserEvent>) {
        self.finalize(out);
    }

    fn finalize(&mut self, out: &mut Vec<ParserEvent>) {
        if let ParserState::InError(done) = std::mem::take(&mut self.state) {
            out.push(ParserEvent::Diagnostic(done));
        }
    }

    fn dispatch_idle(&mut self, line: &str, out: &mut Vec<ParserEvent>) {
        match classify(line) {
            LineKind::BuildStarted => out.push(ParserEvent::BuildStarted),
            LineKind::Header {
                severity,
                path,
                line,
                message,
            } => {
                self.state = ParserState::InError(ParsedDiagnostic {
                    file_path: path.to_string(),
                    line,
                    column: None,
                    severity,
                    detail_lines: vec![message.to_string()],
                });
            }
            LineKind::TestFailure {
                path,
                line,
                message,
            } => out.push(ParserEvent::Diagnostic(ParsedDiagnostic {
                file_path: path.to_string(),
                line,
                column: None,
                severity: Severity::TestFailure,
                detail_lines: vec![message.to_string()],
            })),
            LineKind::BuildFinished(outcome) => out.push(ParserEvent::BuildFinished(outcome)),
            LineKind::Other => {}
        }
    }
}
