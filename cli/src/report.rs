//! Final diagnostic listing.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use sbtdiag_config::OutputFormat;
use sbtdiag_monitor::{Diagnostic, DiagnosticStore, PathResolver};

/// Path shown for a diagnostic: relative to the project when resolved,
/// otherwise as the build tool reported it.
fn shown_path(diagnostic: &Diagnostic, resolver: &dyn PathResolver) -> String {
    diagnostic.resolved().get().map_or_else(
        || diagnostic.file_path().to_string(),
        |path| resolver.relative_path(&path),
    )
}

fn render_text(diagnostics: &[Diagnostic], status: &str, resolver: &dyn PathResolver) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        let _ = writeln!(out, "{}", diagnostic.display_line(&shown_path(diagnostic, resolver)));
    }
    if status.is_empty() {
        out.push_str("No diagnostics.\n");
    } else {
        let _ = writeln!(out, "{status}");
    }
    out
}

fn render_json(diagnostics: &[Diagnostic]) -> Result<String> {
    let mut out = String::new();
    for diagnostic in diagnostics {
        out.push_str(&serde_json::to_string(&diagnostic.record())?);
        out.push('\n');
    }
    Ok(out)
}

/// Wait for pending background resolutions, sharing one deadline across
/// all of them. Returns how many are still unresolved.
async fn await_paths(diagnostics: &[Diagnostic], timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    let mut unresolved = 0;
    for diagnostic in diagnostics {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if diagnostic.resolved().wait_timeout(remaining).await.is_none() {
            tracing::warn!(
                path = %diagnostic.file_path(),
                "Path resolution did not finish in time"
            );
            unresolved += 1;
        }
    }
    unresolved
}

/// Print every effective diagnostic in canonical order.
///
/// Pending background resolutions get `resolve_timeout` in total; a
/// diagnostic whose path is still unresolved is printed with the reported
/// path.
pub async fn print(
    store: &DiagnosticStore,
    resolver: &Arc<dyn PathResolver>,
    format: OutputFormat,
    resolve_timeout: Duration,
) -> Result<()> {
    let diagnostics = store.all();
    await_paths(&diagnostics, resolve_timeout).await;

    let rendered = match format {
        OutputFormat::Text => render_text(
            &diagnostics,
            &store.snapshot().status_string(),
            resolver.as_ref(),
        ),
        OutputFormat::Json => render_json(&diagnostics)?,
    };
    let mut stdout = tokio::io::stdout();
    stdout.write_all(rendered.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
