//! Diagnostic store. Reconciles what the current build has reported
//! against what earlier builds reported.
//!
//! Three generations are kept per store:
//!
//! - `previous`: the view as of the last completed build pass.
//! - `incoming`: what the running build has reported so far.
//! - `effective`: `previous` overlaid with `incoming` at file granularity.
//!   Once the running build reports anything for a file, its incoming set
//!   replaces the previous set for that file wholesale.
//!
//! Queries only ever see `effective`, so a file's diagnostics never vanish
//! mid-build just because the new build has not reached it yet.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{Diagnostic, DiagnosticsSnapshot};

/// file path → line → diagnostics in arrival order.
type Generation = BTreeMap<String, BTreeMap<u32, Vec<Diagnostic>>>;

/// Diagnostics of one file in canonical order: line, then severity rank,
/// then arrival.
fn ordered(lines: &BTreeMap<u32, Vec<Diagnostic>>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for items in lines.values() {
        let mut items = items.clone();
        items.sort_by_key(|d| (d.severity().sort_rank(), d.sequence_id()));
        out.extend(items);
    }
    out
}

#[derive(Debug, Default)]
struct Generations {
    previous: Generation,
    incoming: Generation,
    effective: Generation,
    /// Index into the canonical order of `effective`.
    current: Option<usize>,
}

impl Generations {
    /// Start the incoming set for `path` if the running build has not
    /// reported it yet. The effective entry switches over with it, dropping
    /// whatever the previous generation held for that file.
    fn open_file(&mut self, path: &str) {
        if !self.incoming.contains_key(path) {
            self.incoming.insert(path.to_string(), BTreeMap::new());
            self.effective.insert(path.to_string(), BTreeMap::new());
        }
    }

    fn all(&self) -> Vec<Diagnostic> {
        self.effective.values().flat_map(ordered).collect()
    }

    fn position_of(&self, sequence_id: u64) -> Option<usize> {
        self.all()
            .iter()
            .position(|d| d.sequence_id() == sequence_id)
    }
}

/// Shared, thread-safe diagnostic store.
///
/// Cloning yields another handle to the same store. Every mutation holds the
/// write lock for its whole duration, so readers never observe a partially
/// updated view.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticStore {
    inner: Arc<RwLock<Generations>>,
}

impl DiagnosticStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Generations> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Generations> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a diagnostic reported by the running build.
    pub fn add(&self, diagnostic: Diagnostic) {
        let mut g = self.write();
        let path = diagnostic.file_path();
        let line = diagnostic.line();
        g.open_file(path);
        if let Some(lines) = g.effective.get_mut(path) {
            lines.entry(line).or_default().push(diagnostic.clone());
        }
        if let Some(lines) = g.incoming.get_mut(path) {
            lines.entry(line).or_default().push(diagnostic);
        }
        g.current = None;
    }

    /// Mark `path` as compiled by the running build without adding a
    /// diagnostic, so a cleanly recompiled file ends up empty.
    pub fn touch(&self, path: &str) {
        let mut g = self.write();
        g.open_file(path);
        g.current = None;
    }

    /// Close the running generation.
    ///
    /// Files the running build reported replace their previous sets; files
    /// it never reached keep their previous diagnostics.
    pub fn cycle(&self) {
        let mut g = self.write();
        let incoming = std::mem::take(&mut g.incoming);
        tracing::debug!(files = incoming.len(), "Diagnostic generation rollover");
        g.previous.extend(incoming);
        g.effective = g.previous.clone();
        g.current = None;
    }

    /// Forget everything.
    pub fn clear(&self) {
        let mut g = self.write();
        g.previous.clear();
        g.incoming.clear();
        g.effective.clear();
        g.current = None;
    }

    /// Forget one file in every generation.
    ///
    /// Focus survives unless it pointed into that file.
    pub fn clear_file(&self, path: &str) {
        let mut g = self.write();
        let focused = g
            .current
            .and_then(|index| g.all().get(index).cloned())
            .filter(|d| d.file_path() != path)
            .map(|d| d.sequence_id());

        g.previous.remove(path);
        g.incoming.remove(path);
        g.effective.remove(path);
        g.current = focused.and_then(|id| g.position_of(id));
    }

    /// Diagnostics for one file, ordered by line and severity rank.
    ///
    /// `None` when the file is unknown; an empty list when it is known but
    /// clean.
    #[must_use]
    pub fn diagnostics_for(&self, path: &str) -> Option<Vec<Diagnostic>> {
        self.read().effective.get(path).map(ordered)
    }

    /// Diagnostics on one line of one file.
    #[must_use]
    pub fn diagnostics_at(&self, path: &str, line: u32) -> Vec<Diagnostic> {
        self.read()
            .effective
            .get(path)
            .and_then(|lines| lines.get(&line))
            .map(|items| {
                let mut items = items.clone();
                items.sort_by_key(|d| (d.severity().sort_rank(), d.sequence_id()));
                items
            })
            .unwrap_or_default()
    }

    /// Every effective diagnostic in canonical order (path, line, severity
    /// rank). This order drives navigation and listings.
    #[must_use]
    pub fn all(&self) -> Vec<Diagnostic> {
        self.read().all()
    }

    /// Focus `diagnostic`. Returns whether it is currently in the store.
    pub fn focus(&self, diagnostic: &Diagnostic) -> bool {
        let mut g = self.write();
        g.current = g.position_of(diagnostic.sequence_id());
        g.current.is_some()
    }

    /// The focused diagnostic, if any.
    #[must_use]
    pub fn focused(&self) -> Option<Diagnostic> {
        let g = self.read();
        g.current.and_then(|index| g.all().get(index).cloned())
    }

    /// Advance focus, wrapping after the last diagnostic. Starts at the
    /// first diagnostic when nothing is focused.
    pub fn next(&self) -> Option<Diagnostic> {
        self.step(|index, len| match index {
            Some(i) => (i + 1) % len,
            None => 0,
        })
    }

    /// Move focus backwards, wrapping before the first diagnostic. Starts at
    /// the last diagnostic when nothing is focused.
    pub fn previous(&self) -> Option<Diagnostic> {
        self.step(|index, len| match index {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        })
    }

    fn step(&self, advance: impl FnOnce(Option<usize>, usize) -> usize) -> Option<Diagnostic> {
        let mut g = self.write();
        let all = g.all();
        if all.is_empty() {
            g.current = None;
            return None;
        }
        let index = advance(g.current, all.len());
        g.current = Some(index);
        all.into_iter().nth(index)
    }

    /// Whether any effective diagnostic exists.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.read()
            .effective
            .values()
            .flat_map(BTreeMap::values)
            .any(|items| !items.is_empty())
    }

    /// Immutable view of the effective diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let g = self.read();
        let files = g
            .effective
            .iter()
            .map(|(path, lines)| (path.clone(), ordered(lines)))
            .collect();
        DiagnosticsSnapshot::new(files)
    }
}
