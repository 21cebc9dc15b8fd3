//! Public types consumed by hosts.
//!
//! These types define the interface between `sbtdiag-monitor` and whatever
//! drives it (the `sbtdiag` binary, an editor integration, tests). A host
//! feeds raw output into a [`BuildSession`](crate::BuildSession), receives
//! [`Diagnostic`]s through hooks, and reads [`DiagnosticsSnapshot`]s for
//! display.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    TestFailure,
}

impl Severity {
    /// Map the log-level tag of a compiler header (`[error]` / `[warn]`).
    ///
    /// Test failures have no header form, so they never come from here.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warning),
            _ => None,
        }
    }

    /// Tie-break rank for diagnostics that share a line: warnings sort
    /// first, errors last.
    #[must_use]
    pub fn sort_rank(self) -> u8 {
        match self {
            Self::Warning => 0,
            Self::TestFailure => 1,
            Self::Error => 2,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::TestFailure => "failure",
        }
    }

    /// Human title used in detail-panel banners.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::TestFailure => "Test Failure",
        }
    }
}

/// How a build pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Success,
    Failure,
}

/// Which pipe of the build process a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Rejected [`Diagnostic`] construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticError {
    #[error("diagnostic file path must not be empty")]
    EmptyPath,
    #[error("diagnostic line must be at least 1")]
    ZeroLine,
    #[error("diagnostic column must be at least 1 when present")]
    ZeroColumn,
    #[error("diagnostic detail must contain at least the summary line")]
    EmptyDetail,
}

/// Fields recognised by the output parser, before a sequence id and a
/// resolved location are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiagnostic {
    /// Path exactly as the build tool reported it.
    pub file_path: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column, when a caret line located it.
    pub column: Option<u32>,
    pub severity: Severity,
    /// Full text; the first element is the summary.
    pub detail_lines: Vec<String>,
}

/// The resolved absolute location of a diagnostic, filled in once by a
/// [`PathFulfiller`].
///
/// Resolution may happen on a worker while the diagnostic is already being
/// displayed, so readers either peek ([`get`](Self::get)) or wait with a
/// bound ([`wait_timeout`](Self::wait_timeout)).
#[derive(Clone)]
pub struct PendingPath {
    rx: watch::Receiver<Option<PathBuf>>,
}

/// Write half of a [`PendingPath`].
pub struct PathFulfiller {
    tx: watch::Sender<Option<PathBuf>>,
}

impl PendingPath {
    /// An unresolved path and the handle that completes it.
    #[must_use]
    pub fn channel() -> (PathFulfiller, Self) {
        let (tx, rx) = watch::channel(None);
        (PathFulfiller { tx }, Self { rx })
    }

    /// A path that is already known.
    #[must_use]
    pub fn ready(path: PathBuf) -> Self {
        let (_tx, rx) = watch::channel(Some(path));
        Self { rx }
    }

    /// Non-blocking peek.
    #[must_use]
    pub fn get(&self) -> Option<PathBuf> {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait until the path is resolved.
    ///
    /// Returns `None` if the fulfiller was dropped without resolving.
    pub async fn wait(&self) -> Option<PathBuf> {
        let mut rx = self.rx.clone();
        let resolved = match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        resolved
    }

    /// [`wait`](Self::wait) with an upper bound.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<PathBuf> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .ok()
            .flatten()
    }
}

impl fmt::Debug for PendingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPath")
            .field("resolved", &*self.rx.borrow())
            .finish()
    }
}

impl PathFulfiller {
    /// Complete the pending path. Readers waiting on it wake up.
    pub fn fulfil(self, path: PathBuf) {
        self.tx.send_replace(Some(path));
    }
}

/// One compiler or test message.
///
/// Fields are private and there are no setters; a correction is a new
/// `Diagnostic` with a new sequence id.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    sequence_id: u64,
    file_path: String,
    line: u32,
    column: Option<u32>,
    severity: Severity,
    detail_lines: Vec<String>,
    resolved: PendingPath,
}

impl Diagnostic {
    /// Construct a diagnostic, checking the entity invariants.
    pub fn new(
        sequence_id: u64,
        parsed: ParsedDiagnostic,
        resolved: PendingPath,
    ) -> Result<Self, DiagnosticError> {
        let ParsedDiagnostic {
            file_path,
            line,
            column,
            severity,
            detail_lines,
        } = parsed;

        if file_path.is_empty() {
            return Err(DiagnosticError::EmptyPath);
        }
        if line == 0 {
            return Err(DiagnosticError::ZeroLine);
        }
        if column == Some(0) {
            return Err(DiagnosticError::ZeroColumn);
        }
        if detail_lines.is_empty() {
            return Err(DiagnosticError::EmptyDetail);
        }

        Ok(Self {
            sequence_id,
            file_path,
            line,
            column,
            severity,
            detail_lines,
            resolved,
        })
    }

    /// Creation order across the whole session; unique per diagnostic.
    #[must_use]
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Path as reported by the build tool. This is the store key.
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// 1-based line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column, if the tool pointed at one.
    #[must_use]
    pub fn column(&self) -> Option<u32> {
        self.column
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.detail_lines[0]
    }

    #[must_use]
    pub fn detail_lines(&self) -> &[String] {
        &self.detail_lines
    }

    /// The resolved absolute location (may still be pending).
    #[must_use]
    pub fn resolved(&self) -> &PendingPath {
        &self.resolved
    }

    /// Resolved location if available now, otherwise the reported path.
    #[must_use]
    pub fn location(&self) -> PathBuf {
        self.resolved
            .get()
            .unwrap_or_else(|| PathBuf::from(&self.file_path))
    }

    /// Format as `path:line[:col]: severity: summary`.
    #[must_use]
    pub fn display_line(&self, shown_path: &str) -> String {
        match self.column {
            Some(col) => format!(
                "{shown_path}:{}:{col}: {}: {}",
                self.line,
                self.severity.label(),
                self.summary()
            ),
            None => format!(
                "{shown_path}:{}: {}: {}",
                self.line,
                self.severity.label(),
                self.summary()
            ),
        }
    }

    /// Multi-line text for a detail panel, headed by a ` -- Title -- ` banner.
    #[must_use]
    pub fn full_text(&self, shown_path: &str) -> String {
        let mut text = format!(" -- {} --\n", self.severity.title());
        if self.severity == Severity::TestFailure {
            text.push_str(&format!(
                "{} ({}:{})",
                self.summary(),
                self.file_path,
                self.line
            ));
            return text;
        }
        text.push_str(&format!("{shown_path}:{}: {}", self.line, self.summary()));
        for extra in &self.detail_lines[1..] {
            text.push('\n');
            text.push_str(extra);
        }
        text
    }

    /// Serializable view for machine-readable output.
    #[must_use]
    pub fn record(&self) -> DiagnosticRecord<'_> {
        DiagnosticRecord {
            sequence_id: self.sequence_id,
            file: &self.file_path,
            resolved: self.resolved.get(),
            line: self.line,
            column: self.column,
            severity: self.severity,
            summary: self.summary(),
            detail: &self.detail_lines,
        }
    }
}

/// Borrowed, serializable form of a [`Diagnostic`].
#[derive(Debug, Serialize)]
pub struct DiagnosticRecord<'a> {
    pub sequence_id: u64,
    pub file: &'a str,
    pub resolved: Option<PathBuf>,
    pub line: u32,
    pub column: Option<u32>,
    pub severity: Severity,
    pub summary: &'a str,
    pub detail: &'a [String],
}

/// Immutable snapshot of the effective diagnostics, suitable for UI rendering.
///
/// Counts are computed from `files` on demand rather than cached.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    /// Per-file diagnostics in canonical order (path, line, severity rank).
    files: Vec<(String, Vec<Diagnostic>)>,
}

impl DiagnosticsSnapshot {
    pub(crate) fn new(files: Vec<(String, Vec<Diagnostic>)>) -> Self {
        Self { files }
    }

    /// Per-file diagnostics in canonical order. Files that are known but
    /// clean appear with an empty list.
    #[must_use]
    pub fn files(&self) -> &[(String, Vec<Diagnostic>)] {
        &self.files
    }

    /// Whether there are no diagnostics at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    fn count_by_severity(&self, severity: Severity) -> usize {
        self.files
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_by_severity(Severity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_by_severity(Severity::Warning)
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count_by_severity(Severity::TestFailure)
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.iter().map(|(_, items)| items.len()).sum()
    }

    /// Compact status like "E:3 W:5", with " F:n" appended when tests failed.
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut status = format!("E:{} W:{}", self.error_count(), self.warning_count());
        let failures = self.failure_count();
        if failures > 0 {
            status.push_str(&format!(" F:{failures}"));
        }
        status
    }
}
