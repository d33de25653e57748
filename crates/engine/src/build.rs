// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build state machine.
//!
//! A build owns one job instance and drives it from `pending` through
//! `running` to a terminal state. Main tasks run strictly sequentially;
//! hook tasks fire on the matching state transition. Hooks of kind
//! `pending` run asynchronously, and later transitions block until they
//! complete. Every status change produces exactly one history-store
//! write followed by exactly one broadcast.

use crate::artifacts;
use crate::queue::Queue;
use crate::Deps;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wake_core::{
    BuildUpdate, Clock, Job, Message, Status, SystemClock, TaskKind, TaskSnapshot,
};
use wake_runner::{LogPipeline, LogSink, TaskOutcome, TaskRunner};

/// Per-build mutable state of one task, indexed alongside the job's
/// task list.
#[derive(Debug, Clone)]
struct TaskState {
    status: Status,
    started_at_ms: Option<u64>,
    duration_ms: Option<u64>,
}

/// Mutable build state behind one short-held lock.
struct BuildState {
    status: Status,
    tasks: Vec<TaskState>,
    artifacts: Vec<String>,
    started_at_ms: Option<u64>,
    started: Option<Instant>,
    duration_ms: Option<u64>,
    /// Outstanding `pending`-kind hook tasks; awaited on entry to running
    pending_hooks: Vec<JoinHandle<()>>,
    timeout_timer: Option<JoinHandle<()>>,
}

/// One execution instance of a [`Job`].
pub struct Build {
    id: u64,
    job: Job,
    /// Parameter maps concatenated into every task's environment
    params: Vec<BTreeMap<String, String>>,
    deps: Deps,
    me: Weak<Build>,
    state: Mutex<BuildState>,
    abort_tx: mpsc::Sender<bool>,
    /// Taken by [`start`](Build::start) for the main-task loop
    abort_rx: Mutex<Option<mpsc::Receiver<bool>>>,
    /// Pipeline of the task currently writing, for external flush
    current_log: Mutex<Option<Arc<LogPipeline>>>,
}

impl Build {
    pub fn new(
        id: u64,
        job: Job,
        params: Vec<BTreeMap<String, String>>,
        deps: Deps,
    ) -> Arc<Self> {
        let (abort_tx, abort_rx) = mpsc::channel(1);
        let tasks = job
            .tasks
            .iter()
            .map(|_| TaskState {
                status: Status::Pending,
                started_at_ms: None,
                duration_ms: None,
            })
            .collect();
        Arc::new_cyclic(|me| Self {
            id,
            job,
            params,
            deps,
            me: me.clone(),
            state: Mutex::new(BuildState {
                status: Status::Pending,
                tasks,
                artifacts: Vec::new(),
                started_at_ms: None,
                started: None,
                duration_ms: None,
                pending_hooks: Vec::new(),
                timeout_timer: None,
            }),
            abort_tx,
            abort_rx: Mutex::new(Some(abort_rx)),
            current_log: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    /// Serialized view of the current build state.
    pub fn snapshot(&self) -> BuildUpdate {
        let st = self.state.lock();
        let tasks = self
            .job
            .tasks
            .iter()
            .zip(st.tasks.iter())
            .map(|(task, ts)| TaskSnapshot {
                id: task.id,
                kind: task.kind,
                command: task.command.clone(),
                status: ts.status,
                started_at_ms: ts.started_at_ms,
                duration_ms: ts.duration_ms,
            })
            .collect();
        BuildUpdate {
            id: self.id,
            name: self.job.name.clone(),
            status: st.status,
            tasks,
            params: self.params.clone(),
            artifacts: st.artifacts.clone(),
            started_at_ms: st.started_at_ms,
            duration_ms: st.duration_ms,
        }
    }

    /// Deliver the abort signal to the main-task loop.
    ///
    /// The channel holds one value; a repeated request while one is
    /// already pending is dropped, which keeps abort idempotent.
    pub(crate) fn request_abort(&self) {
        if self.abort_tx.try_send(true).is_err() {
            debug!(build_id = self.id, "abort already signalled");
        }
    }

    /// Flush the log pipeline of the currently running task, if any.
    pub fn flush_logs(&self) -> std::io::Result<()> {
        if let Some(pipeline) = self.current_log.lock().as_ref() {
            pipeline.flush()?;
        }
        Ok(())
    }

    /// Enter `pending`: persist + broadcast, launch pending hooks
    /// asynchronously, and hand the build to the queue.
    pub(crate) fn enter_pending(&self, queue: &Queue) {
        info!(build_id = self.id, job = %self.job.name, "build pending");
        self.publish();
        self.spawn_pending_hooks();
        if let Some(build) = self.me.upgrade() {
            queue.add(build);
        }
        queue.take();
    }

    /// Apply a status transition and its entry actions.
    ///
    /// Invalid transitions (anything leaving a terminal state, or not
    /// following the state machine) are logged and ignored; this is what
    /// makes a second abort a no-op.
    pub(crate) async fn update_status(&self, status: Status, queue: &Arc<Queue>) {
        {
            let mut st = self.state.lock();
            if !st.status.can_transition(status) {
                warn!(
                    build_id = self.id,
                    from = %st.status,
                    to = %status,
                    "ignoring invalid status transition"
                );
                return;
            }
            st.status = status;
            if status == Status::Running {
                st.started = Some(Instant::now());
                st.started_at_ms = Some(SystemClock.epoch_ms());
            }
        }
        info!(build_id = self.id, status = %status, "build status change");

        match status {
            // Entered via enter_pending, never via a transition
            Status::Pending => {}
            Status::Running => {
                self.arm_timeout(queue);
                self.publish();
                self.await_pending_hooks().await;
                self.run_hooks(TaskKind::Running).await;
            }
            Status::Finished => {
                self.collect_artifacts();
                self.run_hooks(TaskKind::Finished).await;
                self.finalize(queue);
            }
            Status::Failed => {
                self.run_hooks(TaskKind::Failed).await;
                self.finalize(queue);
            }
            Status::Aborted => {
                self.run_hooks(TaskKind::Aborted).await;
                self.finalize(queue);
            }
        }
    }

    /// Drive the build from `running` to a terminal state.
    ///
    /// Runs on its own task, spawned by the queue on promotion. Main
    /// tasks execute in declaration order; the first failure or abort
    /// ends the sequence and decides the terminal status.
    pub(crate) async fn start(self: Arc<Self>, queue: Arc<Queue>) {
        self.update_status(Status::Running, &queue).await;

        let mut abort_rx = self.abort_rx.lock().take();
        let main_indexes: Vec<usize> = self.task_indexes(TaskKind::Main);

        let mut terminal = Status::Finished;
        for index in main_indexes {
            match self.run_task(index, abort_rx.as_mut()).await {
                TaskOutcome::Finished => {}
                TaskOutcome::Failed => {
                    terminal = Status::Failed;
                    break;
                }
                TaskOutcome::Aborted => {
                    terminal = Status::Aborted;
                    break;
                }
            }
        }
        self.update_status(terminal, &queue).await;
    }

    // Indexes into the job's task list for the given kind, in order.
    fn task_indexes(&self, kind: TaskKind) -> Vec<usize> {
        self.job
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Run one task under supervision, updating its state and publishing
    /// before and after.
    async fn run_task(
        &self,
        index: usize,
        abort: Option<&mut mpsc::Receiver<bool>>,
    ) -> TaskOutcome {
        let Some(task) = self.job.tasks.get(index) else {
            return TaskOutcome::Failed;
        };
        {
            let mut st = self.state.lock();
            if let Some(ts) = st.tasks.get_mut(index) {
                ts.status = Status::Running;
                ts.started_at_ms = Some(SystemClock.epoch_ms());
            }
        }
        self.publish();

        let started = Instant::now();
        let wakespace = self.deps.config.wakespace_dir(self.id);
        let pipeline = match LogPipeline::create(
            &wakespace,
            self.id,
            task.id,
            self.deps.broker.clone(),
        ) {
            Ok(pipeline) => Arc::new(pipeline),
            Err(e) => {
                error!(
                    build_id = self.id,
                    task_id = task.id,
                    error = %e,
                    "failed to open task log"
                );
                self.finish_task(index, TaskOutcome::Failed, started);
                return TaskOutcome::Failed;
            }
        };
        pipeline.start(&task.command);
        *self.current_log.lock() = Some(Arc::clone(&pipeline));

        let outcome = TaskRunner::new(&task.command)
            .cwd(self.deps.config.workspace_dir(self.id))
            .envs(self.task_env())
            .run(abort, pipeline.as_ref())
            .await;

        pipeline.finish();
        self.current_log.lock().take();
        self.finish_task(index, outcome, started);
        debug!(build_id = self.id, task_id = task.id, outcome = ?outcome, "task done");
        outcome
    }

    fn finish_task(&self, index: usize, outcome: TaskOutcome, started: Instant) {
        {
            let mut st = self.state.lock();
            if let Some(ts) = st.tasks.get_mut(index) {
                ts.status = outcome.as_status();
                ts.duration_ms = Some(started.elapsed().as_millis() as u64);
            }
        }
        self.publish();
    }

    /// The environment injected into every task: the process environment
    /// plus the `WAKE_*` variables, then each parameter map in order
    /// (later entries override earlier ones).
    fn task_env(&self) -> Vec<(String, String)> {
        let config = &self.deps.config;
        let mut env = vec![
            ("WAKE_BUILD_ID".to_string(), self.id.to_string()),
            (
                "WAKE_BUILD_WORKSPACE".to_string(),
                config.workspace_dir(self.id).display().to_string(),
            ),
            ("WAKE_JOB_NAME".to_string(), self.job.name.clone()),
            (
                "WAKE_CONFIG_DIR".to_string(),
                config.config_dir.display().to_string(),
            ),
            ("WAKE_URL".to_string(), config.url()),
        ];
        for map in &self.params {
            for (k, v) in map {
                env.push((k.clone(), v.clone()));
            }
        }
        env
    }

    // Launch pending-kind hooks on their own tasks, tracked so the
    // running transition can wait for them.
    fn spawn_pending_hooks(&self) {
        let indexes = self.task_indexes(TaskKind::Pending);
        if indexes.is_empty() {
            return;
        }
        let mut handles = Vec::with_capacity(indexes.len());
        for index in indexes {
            let Some(build) = self.me.upgrade() else { return };
            handles.push(tokio::spawn(async move {
                build.run_task(index, None).await;
            }));
        }
        self.state.lock().pending_hooks.extend(handles);
    }

    async fn await_pending_hooks(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut st = self.state.lock();
            st.pending_hooks.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                error!(build_id = self.id, error = %e, "pending hook task failed");
            }
        }
    }

    /// Run hooks of the given kind synchronously, in declaration order.
    /// A hook's outcome never changes the build status.
    async fn run_hooks(&self, kind: TaskKind) {
        for index in self.task_indexes(kind) {
            let outcome = self.run_task(index, None).await;
            if outcome != TaskOutcome::Finished {
                warn!(build_id = self.id, kind = %kind, "hook task did not finish cleanly");
            }
        }
    }

    // Arm the one-shot timeout timer; it requests a queue-level abort.
    fn arm_timeout(&self, queue: &Arc<Queue>) {
        let Some(timeout) = self.job.timeout else {
            return;
        };
        let queue = Arc::clone(queue);
        let id = self.id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(
                build_id = id,
                timeout_ms = timeout.as_millis() as u64,
                "build timed out, requesting abort"
            );
            queue.abort(id, Status::Aborted);
        });
        self.state.lock().timeout_timer = Some(handle);
    }

    /// Collect artifacts into the wakespace. Only called on `finished`.
    fn collect_artifacts(&self) {
        if self.job.artifacts.is_empty() {
            return;
        }
        let workspace = self.deps.config.workspace_dir(self.id);
        let dest = self.deps.config.artifacts_dir(self.id);
        let result = artifacts::collect(&workspace, &dest, &self.job.artifacts);
        for (path, err) in &result.failures {
            warn!(build_id = self.id, path = %path, error = %err, "artifact collection failed");
        }
        if !result.copied.is_empty() {
            info!(
                build_id = self.id,
                count = result.copied.len(),
                "artifacts collected"
            );
        }
        self.state.lock().artifacts = result.copied;
    }

    // Terminal-entry tail: set the duration exactly once, stop the
    // timeout timer, publish the final update, and clean up. Cleanup
    // errors are logged but never change the terminal status.
    fn finalize(&self, queue: &Queue) {
        {
            let mut st = self.state.lock();
            if st.duration_ms.is_none() {
                st.duration_ms = Some(
                    st.started
                        .map(|s| s.elapsed().as_millis() as u64)
                        .unwrap_or(0),
                );
            }
            if let Some(timer) = st.timeout_timer.take() {
                timer.abort();
            }
        }
        self.publish();
        if let Err(e) = self.flush_logs() {
            warn!(build_id = self.id, error = %e, "log flush during cleanup failed");
        }
        queue.remove(self.id);
    }

    /// One history-store write, then one broadcast, for every change.
    /// A store failure is logged; the broadcast still goes out and the
    /// in-memory state stays authoritative for the rest of the run.
    fn publish(&self) {
        let update = self.snapshot();
        if let Err(e) = self.deps.store.put(&update) {
            error!(build_id = self.id, error = %e, "history store write failed");
        }
        self.deps.broker.publish(Message::BuildUpdate(update));
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
