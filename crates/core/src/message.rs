// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed broadcast messages.
//!
//! Each message carries a type string of the form `build:update:<id>` or
//! `build:log:<id>`, which is what the transport layer exposes to
//! websocket subscribers.

use crate::update::BuildUpdate;
use serde::{Deserialize, Serialize};

/// One formatted log line from a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub task_id: u32,
    pub data: String,
}

/// A message delivered to every broadcast subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Full build state after a status change
    BuildUpdate(BuildUpdate),
    /// One log line from a running task
    BuildLog { build_id: u64, entry: LogEntry },
}

impl Message {
    /// The message type string, e.g. `build:update:42`.
    pub fn kind(&self) -> String {
        match self {
            Message::BuildUpdate(update) => format!("build:update:{}", update.id),
            Message::BuildLog { build_id, .. } => format!("build:log:{build_id}"),
        }
    }

    /// The build this message concerns.
    pub fn build_id(&self) -> u64 {
        match self {
            Message::BuildUpdate(update) => update.id,
            Message::BuildLog { build_id, .. } => *build_id,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
