// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared setup for the behavioral specs.

use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wake_core::{BuildUpdate, Job};
use wake_engine::{Config, Runtime};

pub struct TestServer {
    #[allow(dead_code)]
    pub dir: TempDir,
    pub runtime: Runtime,
    pub job_file: PathBuf,
}

pub fn server() -> TestServer {
    server_with(|config| config)
}

pub fn server_with(tune: impl FnOnce(Config) -> Config) -> TestServer {
    let dir = TempDir::new().unwrap();
    let jobs_dir = dir.path().join("jobs");
    std::fs::create_dir_all(&jobs_dir).unwrap();
    let job_file = jobs_dir.join("job.yaml");
    std::fs::write(&job_file, "name: spec job\n").unwrap();

    let config = tune(Config::new(dir.path()).with_config_dir(&jobs_dir));
    let runtime = Runtime::new(config).unwrap();
    TestServer {
        dir,
        runtime,
        job_file,
    }
}

impl TestServer {
    pub async fn submit(&self, job: Job) -> u64 {
        self.runtime
            .start_job(job, &self.job_file, Vec::new())
            .await
            .unwrap()
    }

    /// Poll the history store until the build is terminal, then give
    /// hooks and cleanup a moment to settle and return the final record.
    pub async fn wait_terminal(&self, id: u64) -> BuildUpdate {
        let deadline = Duration::from_secs(20);
        let started = std::time::Instant::now();
        loop {
            if let Ok(update) = self.runtime.get_build_status(id) {
                if update.status.is_terminal() {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    return self.runtime.get_build_status(id).unwrap_or(update);
                }
            }
            if started.elapsed() > deadline {
                panic!("build {id} not terminal after {deadline:?}");
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    pub fn task_log(&self, build_id: u64, task_id: u32) -> String {
        let path = self
            .runtime
            .deps()
            .config
            .wakespace_dir(build_id)
            .join(format!("task_{task_id}.log"));
        std::fs::read_to_string(path).unwrap()
    }
}

/// Check a log line against `[ <n>ms] <content>`: bracket, right-justified
/// millisecond field, closing bracket, one space, then the content.
pub fn is_ms_prefixed(line: &str, content: &str) -> bool {
    let Some(rest) = line.strip_prefix('[') else {
        return false;
    };
    let Some((field, tail)) = rest.split_once("] ") else {
        return false;
    };
    let trimmed = field.trim_start();
    let Some(digits) = trimmed.strip_suffix("ms") else {
        return false;
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && tail == content
}
