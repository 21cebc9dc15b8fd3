//! Feeding a `BuildSession` from a live build or a saved log.

use std::path::Path;
use std::process::{ExitCode, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinError;

use sbtdiag_monitor::{BuildOutcome, BuildSession, Stream};

/// Read size for pipes and replayed logs.
const CHUNK_SIZE: usize = 4096;

/// Chunks in flight between the reader tasks and the ingestion loop.
const CHANNEL_CAPACITY: usize = 64;

type Chunk = (Stream, Vec<u8>);

/// Forward raw chunks from one pipe until EOF.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, stream: Stream, tx: mpsc::Sender<Chunk>) {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(?stream, "Read from build output failed: {e}");
                break;
            }
        };
        if tx.send((stream, buf[..n].to_vec())).await.is_err() {
            break;
        }
    }
}

async fn echo_chunk(stream: Stream, chunk: &[u8]) {
    let result = match stream {
        Stream::Stdout => tokio::io::stdout().write_all(chunk).await,
        Stream::Stderr => tokio::io::stderr().write_all(chunk).await,
    };
    if let Err(e) = result {
        tracing::debug!("Echo failed: {e}");
    }
}

/// Log a reader task that panicked or was cancelled. Returns whether it
/// ran to completion.
fn reader_finished(stream: Stream, result: Result<(), JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(?stream, "Output reader task failed: {e}");
            false
        }
    }
}

fn exit_code(code: Option<i32>) -> ExitCode {
    match code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        // Killed by a signal.
        None => ExitCode::FAILURE,
    }
}

/// Run `argv` in `cwd`, feeding both output pipes into `session`.
///
/// Returns the child's exit status as this process's exit code.
pub async fn run_build(
    session: &mut BuildSession,
    argv: &[String],
    cwd: &Path,
    echo: bool,
) -> Result<ExitCode> {
    let Some((program, args)) = argv.split_first() else {
        bail!("build command is empty");
    };
    tracing::info!(program = %program, ?args, "Starting build");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start `{program}`"))?;

    let stdout = child.stdout.take().context("child stdout was not piped")?;
    let stderr = child.stderr.take().context("child stderr was not piped")?;

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let out_task = tokio::spawn(pump(stdout, Stream::Stdout, tx.clone()));
    let err_task = tokio::spawn(pump(stderr, Stream::Stderr, tx));

    while let Some((stream, chunk)) = rx.recv().await {
        if echo {
            echo_chunk(stream, &chunk).await;
        }
        session.feed_stream(stream, &chunk);
    }
    session.finish();

    let (out_result, err_result) = tokio::join!(out_task, err_task);
    reader_finished(Stream::Stdout, out_result);
    reader_finished(Stream::Stderr, err_result);
    let status = child.wait().await.context("failed to wait for build")?;
    tracing::info!(%status, "Build exited");
    Ok(exit_code(status.code()))
}

/// Feed a saved log in fixed-size chunks.
///
/// Exits with failure when the last build in the log failed.
pub async fn replay(session: &mut BuildSession, path: &Path, echo: bool) -> Result<ExitCode> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = content.len(), "Replaying build log");

    let last_outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last_outcome);
    session.on_build_finished(move |outcome| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    });

    for chunk in content.chunks(CHUNK_SIZE) {
        if echo {
            echo_chunk(Stream::Stdout, chunk).await;
        }
        session.feed(chunk);
    }
    session.finish();

    let outcome = *last_outcome.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(match outcome {
        Some(BuildOutcome::Failure) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
