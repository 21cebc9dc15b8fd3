//! Streaming sbt output monitor.
//!
//! Raw build output is split into lines ([`LineSplitter`]), classified by a
//! small state machine ([`OutputParser`]) and reconciled across builds in a
//! [`DiagnosticStore`]. [`BuildSession`] wires the three together.

pub mod parser;
pub mod resolve;
pub mod splitter;
pub mod types;

mod session;
mod store;

pub use parser::{OutputParser, ParserEvent};
pub use resolve::{PathResolver, Resolution, RootResolver};
pub use session::BuildSession;
pub use splitter::{LineSplitter, MAX_LINE_BYTES, strip_terminal_codes};
pub use store::DiagnosticStore;
pub use types::{
    BuildOutcome, Diagnostic, DiagnosticError, DiagnosticRecord, DiagnosticsSnapshot,
    ParsedDiagnostic, PathFulfiller, PendingPath, Severity, Stream,
};
