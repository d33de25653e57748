// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised execution of one shell command.
//!
//! The runner spawns `bash -c <command>`, fans stdout and stderr lines
//! into a single channel in arrival order, and selects between that
//! channel and the build's abort signal. On abort the child is killed,
//! but any lines already buffered are still drained to the sink before
//! the runner returns.

use crate::pipeline::LogSink;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use wake_core::Status;

/// Max bytes in a single log line. Longer lines fail the task.
pub const MAX_LINE_BYTES: usize = 512 * 1024;

/// Capacity of the internal line channel between stream readers and the
/// sink loop.
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Terminal result of one task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Exit code zero
    Finished,
    /// Nonzero exit, start error, stream error, or abnormal completion
    Failed,
    /// The abort signal was consumed before completion
    Aborted,
}

impl TaskOutcome {
    pub fn as_status(self) -> Status {
        match self {
            TaskOutcome::Finished => Status::Finished,
            TaskOutcome::Failed => Status::Failed,
            TaskOutcome::Aborted => Status::Aborted,
        }
    }
}

/// Runs one shell command under supervision.
///
/// Create with [`TaskRunner::new`], configure with builder methods, then
/// call [`run`](TaskRunner::run).
#[derive(Debug)]
pub struct TaskRunner {
    command: String,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl TaskRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Set the working directory for the command.
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    /// Add environment variables on top of the inherited process
    /// environment. Later entries with the same key override earlier ones.
    pub fn envs(
        mut self,
        vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        for (k, v) in vars {
            self.env.push((k.into(), v.into()));
        }
        self
    }

    /// Run the command to completion.
    ///
    /// Every stdout/stderr line is delivered to `sink` in arrival order;
    /// a single logical line is never split. When `abort` yields a value
    /// the child is killed and the outcome is [`TaskOutcome::Aborted`],
    /// after already-buffered lines have been drained.
    pub async fn run(
        &self,
        mut abort: Option<&mut mpsc::Receiver<bool>>,
        sink: &dyn LogSink,
    ) -> TaskOutcome {
        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(command = %self.command, error = %e, "failed to start task process");
                sink.line(&format!("failed to start command: {e}"));
                return TaskOutcome::Failed;
            }
        };
        debug!(command = %self.command, pid = ?child.id(), "task process started");

        let (tx, mut rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(read_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(read_lines(stderr, tx.clone())));
        }
        drop(tx);

        // Select over lines and the abort signal until both streams close.
        // After an abort the loop keeps draining already-buffered lines;
        // the kill closes the streams shortly after.
        let mut aborted = false;
        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => sink.line(&line),
                    None => break,
                },
                _ = recv_abort(&mut abort), if !aborted => {
                    aborted = true;
                    debug!(command = %self.command, "abort signal consumed, killing task process");
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "failed to kill task process");
                    }
                }
            }
        }

        let mut stream_err = false;
        for handle in readers {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    stream_err = true;
                    sink.line(&format!("log stream error: {e}"));
                }
                Err(e) => {
                    stream_err = true;
                    error!(error = %e, "log reader task failed");
                }
            }
        }

        let status = child.wait().await;

        if aborted {
            return TaskOutcome::Aborted;
        }

        match status {
            Ok(status) if status.success() => {
                if stream_err {
                    TaskOutcome::Failed
                } else {
                    TaskOutcome::Finished
                }
            }
            Ok(status) => {
                sink.line(&format!("command exited with {status}"));
                TaskOutcome::Failed
            }
            Err(e) => {
                sink.line(&format!("wait for command failed: {e}"));
                TaskOutcome::Failed
            }
        }
    }
}

/// Resolve when the abort signal is delivered; never resolve otherwise.
async fn recv_abort(abort: &mut Option<&mut mpsc::Receiver<bool>>) {
    if let Some(rx) = abort {
        if rx.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Read lines from one stream into the shared channel.
///
/// Lines are capped at [`MAX_LINE_BYTES`]; an oversize line is a stream
/// error, which fails the task. Invalid UTF-8 is replaced, not rejected.
async fn read_lines(
    stream: impl AsyncRead + Unpin,
    tx: mpsc::Sender<String>,
) -> Result<(), io::Error> {
    let mut reader = BufReader::with_capacity(64 * 1024, stream);
    let mut buf = Vec::with_capacity(4096);
    loop {
        buf.clear();
        let n = read_line_capped(&mut reader, &mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if buf.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("log line exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        if tx.send(line).await.is_err() {
            // Receiver gone; stop reading
            return Ok(());
        }
    }
}

// Read up to and including the next newline, never pulling more than
// MAX_LINE_BYTES + 1 bytes, so a pathological line cannot grow the buffer
// without bound before the length check.
async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> Result<usize, io::Error> {
    let mut limited = reader.take((MAX_LINE_BYTES + 1) as u64);
    limited.read_until(b'\n', buf).await
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
