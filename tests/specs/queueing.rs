// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency-cap and promotion-order specs.

use crate::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use wake_core::{Job, Message, Status, Task};

#[tokio::test]
async fn cap_bounds_concurrent_builds_and_preserves_order() {
    let server = server_with(|config| config.with_concurrency(2));
    let mut rx = server.runtime.subscribe();

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(
            server
                .submit(Job::new(
                    format!("batch-{i}"),
                    vec![Task::main(1, "sleep 1")],
                ))
                .await,
        );
    }

    for &id in &ids {
        let update = server.wait_terminal(id).await;
        assert_eq!(update.status, Status::Finished);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Replay the update stream, tracking concurrent running builds.
    let mut current: HashMap<u64, Status> = HashMap::new();
    let mut running_now = 0usize;
    let mut max_running = 0usize;
    let mut running_order = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        let Message::BuildUpdate(update) = msg else {
            continue;
        };
        let prev = current.insert(update.id, update.status);
        let was_running = prev == Some(Status::Running);
        if update.status == Status::Running && !was_running {
            running_now += 1;
            running_order.push(update.id);
            max_running = max_running.max(running_now);
        } else if update.status.is_terminal() && was_running {
            running_now -= 1;
        }
    }

    assert!(max_running <= 2, "saw {max_running} builds running at once");
    assert_eq!(running_order, ids, "promotion did not respect submission order");
}

#[tokio::test]
async fn take_now_promotes_past_the_cap() {
    let server = server_with(|config| config.with_concurrency(1));
    let blocker = server
        .submit(Job::new("blocker", vec![Task::main(1, "sleep 1")]))
        .await;
    let urgent = server
        .submit(Job::new("urgent", vec![Task::main(1, "echo now")]))
        .await;

    // Stuck behind the cap until promoted manually.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        server.runtime.get_build_status(urgent).unwrap().status,
        Status::Pending
    );

    server.runtime.take_now(urgent);
    let update = server.wait_terminal(urgent).await;
    assert_eq!(update.status, Status::Finished);

    // The blocker was never disturbed.
    let update = server.wait_terminal(blocker).await;
    assert_eq!(update.status, Status::Finished);
}

#[tokio::test]
async fn aborting_a_queued_build_never_runs_it() {
    let server = server_with(|config| config.with_concurrency(1));
    let blocker = server
        .submit(Job::new("blocker", vec![Task::main(1, "sleep 1")]))
        .await;
    let victim = server
        .submit(Job::new("victim", vec![Task::main(1, "echo never")]))
        .await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    server.runtime.abort(victim);

    let update = server.wait_terminal(victim).await;
    assert_eq!(update.status, Status::Aborted);
    assert!(update.started_at_ms.is_none());
    assert_eq!(update.tasks[0].status, Status::Pending);

    let update = server.wait_terminal(blocker).await;
    assert_eq!(update.status, Status::Finished);
}

#[tokio::test]
async fn flushed_logs_are_readable_mid_build() {
    let server = server();
    let id = server
        .submit(Job::new(
            "flushable",
            vec![Task::main(2, "echo early && sleep 2")],
        ))
        .await;

    // Wait for the task to emit its first line, then force a flush.
    tokio::time::sleep(Duration::from_millis(600)).await;
    server.runtime.flush_logs(id).unwrap();

    let log = server.task_log(id, 2);
    assert!(
        log.lines().any(|line| is_ms_prefixed(line, "early")),
        "log was: {log:?}"
    );

    server.runtime.abort(id);
    server.wait_terminal(id).await;
}
