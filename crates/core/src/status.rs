// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build and task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a build or of a single task within a build.
///
/// Builds advance monotonically: `pending → running → {finished | failed |
/// aborted}`. A build that is aborted while still queued moves straight
/// from `pending` to its terminal status without ever running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Admitted but not yet promoted by the queue
    Pending,
    /// Promoted; main tasks are executing
    Running,
    /// All main tasks exited cleanly
    Finished,
    /// A main task failed to start or exited nonzero
    Failed,
    /// The abort signal was consumed (manual abort or timeout)
    Aborted,
}

impl Status {
    /// Check if this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Failed | Status::Aborted)
    }

    /// Check whether the state machine permits moving to `to`.
    ///
    /// Terminal states admit no further transitions; self-transitions are
    /// never valid.
    pub fn can_transition(self, to: Status) -> bool {
        match (self, to) {
            (Status::Pending, Status::Running) => true,
            (Status::Pending, to) if to.is_terminal() => true,
            (Status::Running, to) if to.is_terminal() => true,
            _ => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Running => write!(f, "running"),
            Status::Finished => write!(f, "finished"),
            Status::Failed => write!(f, "failed"),
            Status::Aborted => write!(f, "aborted"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
