// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static job description: an ordered list of tasks plus execution policy.

use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Role of a task within a job.
///
/// `Main` tasks form the primary sequence. Every other kind is a lifecycle
/// hook, executed when the build enters the matching status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Main,
    Pending,
    Running,
    Finished,
    Failed,
    Aborted,
}

impl TaskKind {
    /// The hook kind fired on entry to the given build status.
    pub fn for_status(status: Status) -> TaskKind {
        match status {
            Status::Pending => TaskKind::Pending,
            Status::Running => TaskKind::Running,
            Status::Finished => TaskKind::Finished,
            Status::Failed => TaskKind::Failed,
            Status::Aborted => TaskKind::Aborted,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Main => write!(f, "main"),
            TaskKind::Pending => write!(f, "pending"),
            TaskKind::Running => write!(f, "running"),
            TaskKind::Finished => write!(f, "finished"),
            TaskKind::Failed => write!(f, "failed"),
            TaskKind::Aborted => write!(f, "aborted"),
        }
    }
}

/// One shell command within a job.
///
/// Tasks are immutable once the job is loaded; per-build execution state
/// (status, timestamps) lives in a separate vector owned by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Stable ID, unique within the job
    pub id: u32,
    pub kind: TaskKind,
    pub command: String,
}

impl Task {
    /// Create a main-sequence task.
    pub fn main(id: u32, command: impl Into<String>) -> Self {
        Self {
            id,
            kind: TaskKind::Main,
            command: command.into(),
        }
    }

    /// Create a lifecycle-hook task.
    pub fn hook(id: u32, kind: TaskKind, command: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            command: command.into(),
        }
    }
}

/// Immutable description of what a build executes.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    /// All tasks, main and hooks, in declaration order
    pub tasks: Vec<Task>,
    /// Abort the build if it runs longer than this
    pub timeout: Option<Duration>,
    /// Artifact glob patterns, expanded against the workspace root
    pub artifacts: Vec<String>,
    /// Default parameter maps, concatenated into the task environment
    pub params: Vec<BTreeMap<String, String>>,
    /// Max builds of this job active at once; 0 means unlimited
    pub concurrency: usize,
}

impl Job {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            tasks,
            timeout: None,
            artifacts: Vec::new(),
            params: Vec::new(),
            concurrency: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_artifacts(mut self, patterns: Vec<String>) -> Self {
        self.artifacts = patterns;
        self
    }

    pub fn with_params(mut self, params: Vec<BTreeMap<String, String>>) -> Self {
        self.params = params;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Main-sequence tasks in declaration order.
    pub fn main_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.kind == TaskKind::Main)
    }

    /// Hook tasks of the given kind in declaration order.
    pub fn hook_tasks(&self, kind: TaskKind) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.kind == kind)
    }

    /// Look up a task by its stable ID.
    pub fn task(&self, id: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
