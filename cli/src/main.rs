//! sbtdiag - run sbt and collect what it complains about.
//!
//! ```text
//! sbt stdout ─┐
//!             ├─> mpsc ─> BuildSession::feed_stream ─> DiagnosticStore ─> report
//! sbt stderr ─┘
//! ```
//!
//! `sbtdiag [TASK...]` runs the configured build command; `--replay FILE`
//! pushes a saved log through the same pipeline instead.

mod report;
mod runner;

use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::runtime::Handle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sbtdiag_config::{OutputFormat, SbtdiagConfig};
use sbtdiag_monitor::{BuildSession, Resolution, RootResolver};

#[derive(Parser)]
#[command(name = "sbtdiag")]
#[command(about = "Run sbt and list its compile errors, warnings and test failures")]
struct Cli {
    /// sbt tasks to run (defaults to `build.args` from the config).
    tasks: Vec<String>,

    /// Parse a saved build log instead of running the build tool.
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Output format of the final listing.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Do not echo raw build output.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

/// Log to the first writable file from `sbtdiag_config::log_paths`, or to
/// stderr when none opens.
fn init_tracing(project_root: &Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let mut failures = Vec::new();
    let opened = sbtdiag_config::log_paths(project_root)
        .into_iter()
        .find_map(|path| match open_log(&path) {
            Ok(file) => Some((path, file)),
            Err(e) => {
                failures.push(format!("Cannot log to {}: {e}", path.display()));
                None
            }
        });

    match opened {
        Some((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %path.display(), "Logging initialized");
        }
        // stdout carries the listing; keep logs off it.
        None => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
    }
    for failure in failures {
        tracing::warn!("{failure}");
    }
}

fn open_log(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn output_format(cli: &Cli, config: &SbtdiagConfig) -> OutputFormat {
    match cli.format {
        Some(FormatArg::Text) => OutputFormat::Text,
        Some(FormatArg::Json) => OutputFormat::Json,
        None => config.output_format(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let root = env::current_dir().context("failed to determine working directory")?;
    init_tracing(&root);

    let config = SbtdiagConfig::load(&root);
    let format = output_format(&cli, &config);
    // Raw output would corrupt a JSON listing on the same stdout.
    let echo = config.echo() && !cli.quiet && format == OutputFormat::Text;

    let mut session = BuildSession::new(Arc::new(RootResolver::new(&root)));
    if config.background_resolution() {
        session = session.with_resolution(Resolution::Background(Handle::current()));
    }
    session.on_build_started(|| tracing::info!("sbt started compiling"));

    let exit = match &cli.replay {
        Some(path) => runner::replay(&mut session, path, echo).await?,
        None => {
            let mut argv = config.command();
            if cli.tasks.is_empty() {
                argv.extend(config.default_args());
            } else {
                argv.extend(cli.tasks.iter().cloned());
            }
            runner::run_build(&mut session, &argv, &root, echo).await?
        }
    };

    let store = session.store();
    report::print(&store, session.resolver(), format, config.resolve_timeout()).await?;
    Ok(exit)
}
