// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task log pipeline.
//!
//! Every line a task produces is prefixed with the elapsed time since
//! task start, stripped of ANSI escapes, appended to the task's durable
//! log file, and fanned out to broadcast subscribers as a
//! `build:log:<id>` message. The file writer is buffered; it drains on
//! [`flush`](LogPipeline::flush) and on task completion.

use crate::ansi::strip_ansi;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use wake_core::{log_prefix, Broadcaster, Clock, LogEntry, Message, SystemClock};

/// Receives log lines from a running task.
pub trait LogSink: Send + Sync {
    /// Synthetic first entry: the raw command string, before any output.
    fn start(&self, command: &str);

    /// One line of task output, without its trailing newline.
    fn line(&self, line: &str);
}

/// Formats, persists, and broadcasts the log of one task execution.
pub struct LogPipeline {
    build_id: u64,
    task_id: u32,
    path: PathBuf,
    started: std::time::Instant,
    clock: Box<dyn Clock>,
    broker: Broadcaster,
    writer: Mutex<BufWriter<File>>,
}

impl LogPipeline {
    /// Open the log file `task_<id>.log` under the given directory and
    /// start the elapsed-time clock.
    pub fn create(
        dir: &Path,
        build_id: u64,
        task_id: u32,
        broker: Broadcaster,
    ) -> io::Result<Self> {
        Self::with_clock(dir, build_id, task_id, broker, Box::new(SystemClock))
    }

    pub fn with_clock(
        dir: &Path,
        build_id: u64,
        task_id: u32,
        broker: Broadcaster,
        clock: Box<dyn Clock>,
    ) -> io::Result<Self> {
        let path = dir.join(format!("task_{task_id}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let started = clock.now();
        Ok(Self {
            build_id,
            task_id,
            path,
            started,
            clock,
            broker,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the log file this pipeline writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain the buffered writer to disk.
    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }

    /// Flush at task completion. Errors are logged, not propagated; a
    /// failed log flush never changes a task's outcome.
    pub fn finish(&self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "log flush failed");
        }
    }

    fn write(&self, data: &str) {
        if let Err(e) = self.writer.lock().write_all(data.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "log write failed");
        }
    }

    fn publish(&self, data: String) {
        self.broker.publish(Message::BuildLog {
            build_id: self.build_id,
            entry: LogEntry {
                task_id: self.task_id,
                data,
            },
        });
    }
}

impl LogSink for LogPipeline {
    fn start(&self, command: &str) {
        self.write(&format!("{command}\n"));
        self.publish(command.to_string());
    }

    fn line(&self, line: &str) {
        let elapsed = self.clock.now().saturating_duration_since(self.started);
        let formatted = format!("{}{}", log_prefix(elapsed), strip_ansi(line));
        self.write(&format!("{formatted}\n"));
        self.publish(formatted);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
