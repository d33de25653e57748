// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration and the directory layout derived from it.

use std::path::PathBuf;

/// Default build concurrency cap.
const DEFAULT_CONCURRENT_BUILDS: usize = 2;

/// Runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for workspaces, wakespaces, and the history database
    pub workdir: PathBuf,
    /// Directory job files are loaded from (exposed to tasks as
    /// `WAKE_CONFIG_DIR`)
    pub config_dir: PathBuf,
    /// Port the HTTP layer serves on; only the URL scheme depends on it
    pub port: u16,
    /// Max builds running at once; changes take effect on the next take
    pub concurrent_builds: usize,
}

impl Config {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        let config_dir = workdir.clone();
        Self {
            workdir,
            config_dir,
            port: 8080,
            concurrent_builds: DEFAULT_CONCURRENT_BUILDS,
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_concurrency(mut self, cap: usize) -> Self {
        self.concurrent_builds = cap;
        self
    }

    /// Per-build scratch directory; tasks run here.
    pub fn workspace_dir(&self, build_id: u64) -> PathBuf {
        self.workdir.join("workspace").join(build_id.to_string())
    }

    /// Per-build metadata directory: job file copy, task logs, artifacts.
    pub fn wakespace_dir(&self, build_id: u64) -> PathBuf {
        self.workdir.join("wakespace").join(build_id.to_string())
    }

    /// Where collected artifacts land, inside the wakespace.
    pub fn artifacts_dir(&self, build_id: u64) -> PathBuf {
        self.wakespace_dir(build_id).join("artifacts")
    }

    /// Location of the history database.
    pub fn history_path(&self) -> PathBuf {
        self.workdir.join("history")
    }

    /// Server URL as exposed to tasks via `WAKE_URL`.
    pub fn url(&self) -> String {
        let scheme = if self.port == 443 { "https" } else { "http" };
        format!("{scheme}://localhost:{}", self.port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
