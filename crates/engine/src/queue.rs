// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency-limited build queue.
//!
//! Builds are admitted in `pending` and promoted FIFO as slots free up.
//! `take_now` bypasses the cap for manual promotion. The queue owns the
//! active set; a build is dropped from it only after cleanup, and every
//! removal triggers another take so the queue never stalls.

use crate::build::Build;
use crate::error::EngineError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use wake_core::Status;

pub struct Queue {
    me: Weak<Queue>,
    inner: Mutex<QueueState>,
}

struct QueueState {
    cap: usize,
    /// Pending build IDs in admission order
    queued: VecDeque<u64>,
    /// Every admitted build, queued or running, until removal
    builds: HashMap<u64, Arc<Build>>,
    /// Promoted builds not yet removed
    active: Vec<u64>,
}

impl QueueState {
    // Oldest queued build whose job-level concurrency limit is not
    // exhausted. Promotes it into the active set.
    fn pop_eligible(&mut self) -> Option<Arc<Build>> {
        let pos = self.queued.iter().position(|id| {
            let Some(build) = self.builds.get(id) else {
                return false;
            };
            let limit = build.job().concurrency;
            if limit == 0 {
                return true;
            }
            let active_same = self
                .active
                .iter()
                .filter(|aid| {
                    self.builds
                        .get(aid)
                        .is_some_and(|b| b.job().name == build.job().name)
                })
                .count();
            active_same < limit
        })?;
        let id = self.queued.remove(pos)?;
        self.active.push(id);
        self.builds.get(&id).cloned()
    }
}

impl Queue {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            inner: Mutex::new(QueueState {
                cap,
                queued: VecDeque::new(),
                builds: HashMap::new(),
                active: Vec::new(),
            }),
        })
    }

    /// Change the concurrency cap; takes effect on the next take.
    pub fn set_concurrency(&self, cap: usize) {
        self.inner.lock().cap = cap;
    }

    /// Admit a newly created pending build.
    pub(crate) fn add(&self, build: Arc<Build>) {
        let mut q = self.inner.lock();
        debug!(build_id = build.id(), "build queued");
        q.queued.push_back(build.id());
        q.builds.insert(build.id(), build);
    }

    /// Promote the oldest eligible queued build if the active count is
    /// below the cap; otherwise do nothing.
    pub fn take(&self) {
        let promoted = {
            let mut q = self.inner.lock();
            if q.active.len() >= q.cap {
                None
            } else {
                q.pop_eligible()
            }
        };
        if let Some(build) = promoted {
            self.start_build(build);
        }
    }

    /// Promote the named build regardless of the cap.
    pub fn take_now(&self, id: u64) {
        let promoted = {
            let mut q = self.inner.lock();
            match q.queued.iter().position(|&qid| qid == id) {
                Some(pos) => {
                    q.queued.remove(pos);
                    q.active.push(id);
                    q.builds.get(&id).cloned()
                }
                None => {
                    warn!(build_id = id, "take_now: build is not queued");
                    None
                }
            }
        };
        if let Some(build) = promoted {
            self.start_build(build);
        }
    }

    fn start_build(&self, build: Arc<Build>) {
        let Some(queue) = self.me.upgrade() else {
            return;
        };
        info!(build_id = build.id(), job = %build.job().name, "starting build");
        tokio::spawn(build.start(queue));
    }

    /// Abort a build.
    ///
    /// A still-queued build transitions straight to `status`; a running
    /// build gets `true` on its abort channel. Repeated calls are safe;
    /// only the first has effect.
    pub fn abort(&self, id: u64, status: Status) {
        enum Target {
            Queued(Arc<Build>),
            Active(Arc<Build>),
            Unknown,
        }
        let target = {
            let mut q = self.inner.lock();
            match q.queued.iter().position(|&qid| qid == id) {
                Some(pos) => {
                    q.queued.remove(pos);
                    match q.builds.get(&id) {
                        Some(build) => Target::Queued(Arc::clone(build)),
                        None => Target::Unknown,
                    }
                }
                None => match q.builds.get(&id) {
                    Some(build) => Target::Active(Arc::clone(build)),
                    None => Target::Unknown,
                },
            }
        };
        match target {
            Target::Queued(build) => {
                let Some(queue) = self.me.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    build.update_status(status, &queue).await;
                });
            }
            Target::Active(build) => build.request_abort(),
            Target::Unknown => warn!(build_id = id, "abort requested for unknown build"),
        }
    }

    /// Flush the buffered task log of a running build.
    pub fn flush_logs(&self, id: u64) -> Result<(), EngineError> {
        let build = self
            .inner
            .lock()
            .builds
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownBuild(id))?;
        build.flush_logs()?;
        Ok(())
    }

    /// Drop a build after cleanup, then take the next queued build.
    pub(crate) fn remove(&self, id: u64) {
        {
            let mut q = self.inner.lock();
            q.builds.remove(&id);
            q.active.retain(|&aid| aid != id);
            q.queued.retain(|&qid| qid != id);
        }
        self.take();
    }

    /// Look up an admitted build.
    pub fn get(&self, id: u64) -> Option<Arc<Build>> {
        self.inner.lock().builds.get(&id).cloned()
    }

    /// Number of builds currently promoted.
    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Number of builds waiting for promotion.
    pub fn queued_count(&self) -> usize {
        self.inner.lock().queued.len()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
