// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialized build state: the record broadcast on every status change and
//! persisted in the history store.

use crate::job::TaskKind;
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A task merged with its per-build execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: u32,
    pub kind: TaskKind,
    pub command: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Full build state at one point in time.
///
/// Exactly one of these is broadcast and written to the history store per
/// status change; the stored record always equals the last one broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildUpdate {
    pub id: u64,
    pub name: String,
    pub status: Status,
    pub tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    pub params: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
