// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine entry point: build creation and the control surface the
//! transport layer calls.

use crate::build::Build;
use crate::config::Config;
use crate::error::EngineError;
use crate::queue::Queue;
use crate::Deps;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use wake_core::{Broadcaster, BuildUpdate, Job, Message, Status};
use wake_store::HistoryStore;

pub struct Runtime {
    deps: Deps,
    queue: Arc<Queue>,
}

impl Runtime {
    /// Open the history store under the configured workdir and stand up
    /// an empty queue.
    pub fn new(config: Config) -> Result<Self, EngineError> {
        let store = HistoryStore::open(&config.history_path())?;
        let queue = Queue::new(config.concurrent_builds);
        let deps = Deps {
            config: Arc::new(config),
            store: Arc::new(store),
            broker: Broadcaster::new(),
        };
        Ok(Self { deps, queue })
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Subscribe to all build update and log messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.deps.broker.subscribe()
    }

    /// Create a build for the given job and enqueue it.
    ///
    /// Allocates the ID transactionally, provisions the workspace and
    /// wakespace directories, copies the job file verbatim as
    /// `build<ext>`, then transitions the new build to `pending`. Any
    /// filesystem failure aborts creation and propagates unchanged.
    pub async fn start_job(
        &self,
        job: Job,
        job_file: &Path,
        params: Vec<BTreeMap<String, String>>,
    ) -> Result<u64, EngineError> {
        let id = self.deps.store.next_build_id()?;
        let config = &self.deps.config;

        tokio::fs::create_dir_all(config.workspace_dir(id)).await?;
        tokio::fs::create_dir_all(config.artifacts_dir(id)).await?;
        let ext = job_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let copy_target = config.wakespace_dir(id).join(format!("build{ext}"));
        tokio::fs::copy(job_file, &copy_target).await?;

        info!(build_id = id, job = %job.name, "build created");

        // Job-level default params first, then submitted params; later
        // maps override earlier keys at env-injection time.
        let mut merged = job.params.clone();
        merged.extend(params);

        let build = Build::new(id, job, merged, self.deps.clone());
        build.enter_pending(&self.queue);
        Ok(id)
    }

    /// Abort a queued or running build.
    pub fn abort(&self, id: u64) {
        self.queue.abort(id, Status::Aborted);
    }

    /// Force the buffered task log of a running build to disk.
    pub fn flush_logs(&self, id: u64) -> Result<(), EngineError> {
        self.queue.flush_logs(id)
    }

    /// Promote a queued build past the concurrency cap.
    pub fn take_now(&self, id: u64) {
        self.queue.take_now(id);
    }

    /// Change the build concurrency cap at runtime.
    pub fn set_concurrency(&self, cap: usize) {
        self.queue.set_concurrency(cap);
    }

    /// The job config a build ran with: `build_plan<ext>` if present in
    /// the wakespace, else the verbatim `build<ext>` copy.
    pub fn get_build_config(&self, id: u64) -> Result<String, EngineError> {
        let dir = self.deps.config.wakespace_dir(id);
        let mut fallback: Option<PathBuf> = None;
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some("build_plan") => return Ok(std::fs::read_to_string(&path)?),
                Some("build") => fallback = Some(path),
                _ => {}
            }
        }
        match fallback {
            Some(path) => Ok(std::fs::read_to_string(&path)?),
            None => Err(EngineError::MissingConfig(id)),
        }
    }

    /// The last stored status record for a build.
    pub fn get_build_status(&self, id: u64) -> Result<BuildUpdate, EngineError> {
        self.deps
            .store
            .get(id)?
            .ok_or(EngineError::UnknownBuild(id))
    }

    /// The most recent `n` build records, newest first.
    pub fn build_history(&self, n: usize) -> Result<Vec<BuildUpdate>, EngineError> {
        Ok(self.deps.store.latest(n)?)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
