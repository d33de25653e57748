// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wake-engine: Build state machine, queue, and control surface

pub mod artifacts;
pub mod build;
pub mod config;
pub mod error;
pub mod queue;
pub mod runtime;

#[cfg(test)]
mod test_helpers;

pub use build::Build;
pub use config::Config;
pub use error::EngineError;
pub use queue::Queue;
pub use runtime::Runtime;

use std::sync::Arc;
use wake_core::Broadcaster;
use wake_store::HistoryStore;

/// Shared dependencies handed to every build.
///
/// Passed explicitly from the entry points rather than living in
/// file-scope globals.
#[derive(Clone)]
pub struct Deps {
    pub config: Arc<Config>,
    pub store: Arc<HistoryStore>,
    pub broker: Broadcaster,
}
