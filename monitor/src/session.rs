//! `BuildSession`, the coordinator hosts drive.
//!
//! Raw output goes in through [`feed`](BuildSession::feed) or
//! [`feed_stream`](BuildSession::feed_stream); diagnostics come out through
//! the store and the registered hooks. A session is an ordinary owned value:
//! one per build tool instance, passed by reference to whoever needs it.

use std::fmt;
use std::sync::Arc;

use crate::parser::{OutputParser, ParserEvent};
use crate::resolve::{PathResolver, Resolution};
use crate::splitter::LineSplitter;
use crate::store::DiagnosticStore;
use crate::types::{BuildOutcome, Diagnostic, ParsedDiagnostic, Stream};

type DiagnosticHook = Box<dyn FnMut(&Diagnostic) + Send>;
type StartedHook = Box<dyn FnMut() + Send>;
type FinishedHook = Box<dyn FnMut(BuildOutcome) + Send>;

/// Splitters → parser → store, plus event hooks.
pub struct BuildSession {
    stdout: LineSplitter,
    stderr: LineSplitter,
    parser: OutputParser,
    store: DiagnosticStore,
    resolver: Arc<dyn PathResolver>,
    resolution: Resolution,
    next_sequence: u64,
    diagnostic_hooks: Vec<DiagnosticHook>,
    started_hooks: Vec<StartedHook>,
    finished_hooks: Vec<FinishedHook>,
}

impl BuildSession {
    /// A session with an empty store and inline path resolution.
    #[must_use]
    pub fn new(resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            stdout: LineSplitter::new(),
            stderr: LineSplitter::new(),
            parser: OutputParser::new(),
            store: DiagnosticStore::new(),
            resolver,
            resolution: Resolution::Inline,
            next_sequence: 1,
            diagnostic_hooks: Vec::new(),
            started_hooks: Vec::new(),
            finished_hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Handle to the store. Clones share state with the session.
    #[must_use]
    pub fn store(&self) -> DiagnosticStore {
        self.store.clone()
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn PathResolver> {
        &self.resolver
    }

    pub fn on_diagnostic(&mut self, hook: impl FnMut(&Diagnostic) + Send + 'static) {
        self.diagnostic_hooks.push(Box::new(hook));
    }

    pub fn on_build_started(&mut self, hook: impl FnMut() + Send + 'static) {
        self.started_hooks.push(Box::new(hook));
    }

    pub fn on_build_finished(&mut self, hook: impl FnMut(BuildOutcome) + Send + 'static) {
        self.finished_hooks.push(Box::new(hook));
    }

    /// Feed a chunk of stdout.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.feed_stream(Stream::Stdout, chunk);
    }

    /// Feed a chunk from one output stream.
    ///
    /// Each stream has its own line buffer; lines from both go through the
    /// same parser in the order they complete.
    pub fn feed_stream(&mut self, stream: Stream, chunk: &[u8]) {
        let splitter = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        let mut events = Vec::new();
        for line in splitter.feed(chunk) {
            self.parser.push_line(&line, &mut events);
        }
        self.dispatch(events);
    }

    /// End of output: flush unterminated lines and any open diagnostic.
    pub fn finish(&mut self) {
        let mut events = Vec::new();
        for line in self.stdout.finish().into_iter().chain(self.stderr.finish()) {
            self.parser.push_line(&line, &mut events);
        }
        self.parser.finish(&mut events);
        self.dispatch(events);
    }

    fn dispatch(&mut self, events: Vec<ParserEvent>) {
        for event in events {
            match event {
                ParserEvent::BuildStarted => {
                    tracing::debug!("Build started");
                    for hook in &mut self.started_hooks {
                        hook();
                    }
                }
                ParserEvent::Diagnostic(parsed) => self.publish(parsed),
                ParserEvent::BuildFinished(outcome) => {
                    // Files a build did not recompile keep their diagnostics,
                    // whether it passed or not.
                    self.store.cycle();
                    tracing::info!(?outcome, diagnostics = self.store.all().len(), "Build finished");
                    for hook in &mut self.finished_hooks {
                        hook(outcome);
                    }
                }
            }
        }
    }

    fn publish(&mut self, parsed: ParsedDiagnostic) {
        let resolved = self.resolution.start(&self.resolver, &parsed.file_path);
        let sequence_id = self.next_sequence;
        let diagnostic = match Diagnostic::new(sequence_id, parsed, resolved) {
            Ok(diagnostic) => diagnostic,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed diagnostic");
                return;
            }
        };
        self.next_sequence += 1;

        tracing::debug!(
            path = %diagnostic.file_path(),
            line = diagnostic.line(),
            severity = diagnostic.severity().label(),
            "Diagnostic"
        );
        self.store.add(diagnostic.clone());
        for hook in &mut self.diagnostic_hooks {
            hook(&diagnostic);
        }
    }
}

impl fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSession")
            .field("parser", &self.parser)
            .field("resolution", &self.resolution)
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}
