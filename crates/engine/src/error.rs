// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the engine's control operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history store error: {0}")]
    Store(#[from] wake_store::StoreError),
    #[error("unknown build: {0}")]
    UnknownBuild(u64),
    #[error("no job config stored for build {0}")]
    MissingConfig(u64),
}
