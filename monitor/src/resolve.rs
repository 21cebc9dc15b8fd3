//! Path resolution seam.
//!
//! Build tools report paths however they like: absolute, relative to the
//! project, sometimes a bare file name. Turning those into something a host
//! can open is the host's business, so the session only talks to a
//! [`PathResolver`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::types::PendingPath;

/// Host-supplied path resolution.
pub trait PathResolver: Send + Sync {
    /// Map a path as reported by the build tool to an absolute location.
    fn resolve(&self, reported: &str) -> PathBuf;

    /// Shorten an absolute path for display. Never used for matching.
    fn relative_path(&self, path: &Path) -> String;
}

/// Resolves against a fixed project root without touching the file system.
#[derive(Debug, Clone)]
pub struct RootResolver {
    root: PathBuf,
}

impl RootResolver {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PathResolver for RootResolver {
    fn resolve(&self, reported: &str) -> PathBuf {
        let path = Path::new(reported);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Where resolution runs.
#[derive(Debug, Clone, Default)]
pub enum Resolution {
    /// On the ingestion path, before the diagnostic is published.
    #[default]
    Inline,
    /// On a blocking worker of the given runtime. Diagnostics are published
    /// with a pending path that completes later.
    Background(Handle),
}

impl Resolution {
    pub(crate) fn start(&self, resolver: &Arc<dyn PathResolver>, reported: &str) -> PendingPath {
        match self {
            Self::Inline => PendingPath::ready(resolver.resolve(reported)),
            Self::Background(handle) => {
                let (fulfiller, pending) = PendingPath::channel();
                let resolver = Arc::clone(resolver);
                let reported = reported.to_string();
                handle.spawn_blocking(move || {
                    let path = resolver.resolve(&reported);
                    tracing::trace!(reported = %reported, path = %path.display(), "Path resolved");
                    fulfiller.fulfil(path);
                });
                pending
            }
        }
    }
}
