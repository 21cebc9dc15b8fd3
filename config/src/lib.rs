//! Configuration for sbtdiag.
//!
//! Two optional TOML files are layered: the global `~/.sbtdiag/config.toml`
//! and a per-project `.sbtdiag.toml`. A key set in the project file wins over
//! the same key in the global file; unset keys fall through to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

/// Default bound on waiting for a background path resolution.
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 2000;

/// File name of the per-project configuration.
pub const PROJECT_FILE_NAME: &str = ".sbtdiag.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// argv of the build tool.
    pub command: Option<Vec<String>>,
    /// Tasks appended when none are given on the command line.
    pub args: Option<Vec<String>>,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    pub background_resolution: Option<bool>,
    pub resolve_timeout_ms: Option<u64>,
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
    /// Echo raw build output while parsing it.
    pub echo: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SbtdiagConfig {
    pub build: Option<BuildConfig>,
    pub monitor: Option<MonitorConfig>,
    pub output: Option<OutputConfig>,
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
///
/// An unterminated `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl SbtdiagConfig {
    /// Parse one file. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse one file if it exists. Unreadable or invalid files are logged
    /// and skipped.
    #[must_use]
    pub fn load_optional(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from(path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Some(config)
            }
            Err(err) => {
                tracing::warn!("{err}; using defaults for this layer");
                None
            }
        }
    }

    /// Global config layered under the project config in `project_root`.
    #[must_use]
    pub fn load(project_root: &Path) -> Self {
        let global = global_path()
            .and_then(|path| Self::load_optional(&path))
            .unwrap_or_default();
        let project = Self::load_optional(&project_path(project_root)).unwrap_or_default();
        global.layered(project)
    }

    /// Per-field overlay: every key set in `over` replaces the one in `self`.
    #[must_use]
    pub fn layered(self, over: Self) -> Self {
        let build = match (self.build, over.build) {
            (Some(base), Some(top)) => Some(BuildConfig {
                command: top.command.or(base.command),
                args: top.args.or(base.args),
            }),
            (base, top) => top.or(base),
        };
        let monitor = match (self.monitor, over.monitor) {
            (Some(base), Some(top)) => Some(MonitorConfig {
                background_resolution: top.background_resolution.or(base.background_resolution),
                resolve_timeout_ms: top.resolve_timeout_ms.or(base.resolve_timeout_ms),
            }),
            (base, top) => top.or(base),
        };
        let output = match (self.output, over.output) {
            (Some(base), Some(top)) => Some(OutputConfig {
                format: top.format.or(base.format),
                echo: top.echo.or(base.echo),
            }),
            (base, top) => top.or(base),
        };
        Self {
            build,
            monitor,
            output,
        }
    }

    /// Build tool argv with `${VAR}` expanded. Defaults to `["sbt"]`.
    #[must_use]
    pub fn command(&self) -> Vec<String> {
        self.build
            .as_ref()
            .and_then(|b| b.command.as_ref())
            .filter(|command| !command.is_empty())
            .map_or_else(
                || vec!["sbt".to_string()],
                |command| command.iter().map(|s| expand_env_vars(s)).collect(),
            )
    }

    /// Default tasks with `${VAR}` expanded.
    #[must_use]
    pub fn default_args(&self) -> Vec<String> {
        self.build
            .as_ref()
            .and_then(|b| b.args.as_ref())
            .map(|args| args.iter().map(|s| expand_env_vars(s)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn background_resolution(&self) -> bool {
        self.monitor
            .as_ref()
            .and_then(|m| m.background_resolution)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn resolve_timeout(&self) -> Duration {
        let ms = self
            .monitor
            .as_ref()
            .and_then(|m| m.resolve_timeout_ms)
            .unwrap_or(DEFAULT_RESOLVE_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        self.output
            .as_ref()
            .and_then(|o| o.format)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn echo(&self) -> bool {
        self.output.as_ref().and_then(|o| o.echo).unwrap_or(true)
    }
}

#[must_use]
pub fn global_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sbtdiag").join("config.toml"))
}

#[must_use]
pub fn project_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_FILE_NAME)
}

/// Where the log file may go, most preferred first: next to the global
/// config, then under the project.
#[must_use]
pub fn log_paths(project_root: &Path) -> Vec<PathBuf> {
    let global_dir = global_path().and_then(|path| path.parent().map(Path::to_path_buf));
    global_dir
        .into_iter()
        .chain([project_root.join(".sbtdiag")])
        .map(|dir| dir.join("logs").join("sbtdiag.log"))
        .collect()
}
