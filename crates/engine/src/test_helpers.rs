// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests.

use crate::build::Build;
use crate::config::Config;
use crate::queue::Queue;
use crate::Deps;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wake_core::{Broadcaster, Job, Status};
use wake_store::HistoryStore;

pub(crate) struct TestRig {
    #[allow(dead_code)]
    pub dir: TempDir,
    pub deps: Deps,
    pub queue: Arc<Queue>,
}

// RUST_LOG=debug makes failing timing tests readable.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub(crate) fn rig() -> TestRig {
    rig_with_cap(4)
}

pub(crate) fn rig_with_cap(cap: usize) -> TestRig {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = Config::new(dir.path()).with_concurrency(cap);
    let store = HistoryStore::open(&config.history_path()).unwrap();
    let deps = Deps {
        config: Arc::new(config),
        store: Arc::new(store),
        broker: Broadcaster::new(),
    };
    let queue = Queue::new(cap);
    TestRig { dir, deps, queue }
}

impl TestRig {
    /// Allocate an ID, provision directories, and enqueue a build for
    /// the given job.
    pub fn submit(&self, job: Job) -> Arc<Build> {
        let id = self.deps.store.next_build_id().unwrap();
        std::fs::create_dir_all(self.deps.config.workspace_dir(id)).unwrap();
        std::fs::create_dir_all(self.deps.config.artifacts_dir(id)).unwrap();
        let build = Build::new(id, job, Vec::new(), self.deps.clone());
        build.enter_pending(&self.queue);
        build
    }
}

/// Poll a build until it reaches a terminal status.
pub(crate) async fn wait_terminal(build: &Build) -> Status {
    let deadline = Duration::from_secs(15);
    let started = std::time::Instant::now();
    loop {
        let status = build.status();
        if status.is_terminal() {
            return status;
        }
        if started.elapsed() > deadline {
            panic!("build {} still {} after {:?}", build.id(), status, deadline);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
