// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-build lifecycle specs: success, failure, abort, timeout.

use crate::prelude::*;
use std::time::Duration;
use wake_core::{Job, Message, Status, Task};

#[tokio::test]
async fn successful_build_finishes_and_logs_its_output() {
    let server = server();
    let id = server
        .submit(Job::new("hello", vec![Task::main(1, "echo hi")]))
        .await;

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Finished);
    assert_eq!(update.tasks[0].status, Status::Finished);
    assert!(update.artifacts.is_empty());

    let log = server.task_log(id, 1);
    let matching: Vec<&str> = log
        .lines()
        .filter(|line| is_ms_prefixed(line, "hi"))
        .collect();
    assert_eq!(matching.len(), 1, "log was: {log:?}");
}

#[tokio::test]
async fn failed_build_stops_at_the_failing_task() {
    let server = server();
    let mut rx = server.runtime.subscribe();
    let id = server
        .submit(Job::new(
            "fails",
            vec![
                Task::main(1, "echo a"),
                Task::main(2, "exit 3"),
                Task::main(3, "echo b"),
            ],
        ))
        .await;

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Failed);
    assert_eq!(update.tasks[0].status, Status::Finished);
    assert_eq!(update.tasks[1].status, Status::Failed);
    // The third task never runs.
    assert_eq!(update.tasks[2].status, Status::Pending);
    assert!(update.tasks[2].started_at_ms.is_none());

    // Exactly three build status broadcasts: pending, running, failed.
    let mut statuses = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::BuildUpdate(update) = msg {
            if statuses.last() != Some(&update.status) {
                statuses.push(update.status);
            }
        }
    }
    assert_eq!(
        statuses,
        vec![Status::Pending, Status::Running, Status::Failed]
    );
}

#[tokio::test]
async fn aborted_build_reports_aborted_quickly() {
    let server = server();
    let id = server
        .submit(Job::new("sleepy", vec![Task::main(1, "sleep 30")]))
        .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.runtime.abort(id);

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Aborted);
    assert_eq!(update.tasks[0].status, Status::Aborted);

    let duration = update.duration_ms.unwrap();
    assert!(duration < 5_000, "duration was {duration}ms");
}

#[tokio::test]
async fn abort_is_idempotent() {
    let server = server();
    let mut rx = server.runtime.subscribe();
    let id = server
        .submit(Job::new("sleepy", vec![Task::main(1, "sleep 30")]))
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    server.runtime.abort(id);
    server.runtime.abort(id);

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Aborted);

    let mut terminal_updates = 0;
    while let Ok(msg) = rx.try_recv() {
        if let Message::BuildUpdate(update) = msg {
            if update.status.is_terminal() {
                terminal_updates += 1;
            }
        }
    }
    assert_eq!(terminal_updates, 1);
}

#[tokio::test]
async fn timeout_aborts_the_build_on_schedule() {
    let server = server();
    let id = server
        .submit(
            Job::new("deadline", vec![Task::main(1, "sleep 5")])
                .with_timeout(Duration::from_millis(500)),
        )
        .await;

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Aborted);

    let duration = update.duration_ms.unwrap();
    assert!(duration >= 400, "duration was {duration}ms");
    assert!(duration < 4_000, "duration was {duration}ms");
}

#[tokio::test]
async fn stored_record_round_trips_the_last_broadcast() {
    let server = server();
    let mut rx = server.runtime.subscribe();
    let id = server
        .submit(Job::new("audit", vec![Task::main(1, "echo done")]))
        .await;

    server.wait_terminal(id).await;

    let mut last = None;
    while let Ok(msg) = rx.try_recv() {
        if let Message::BuildUpdate(update) = msg {
            last = Some(update);
        }
    }
    let last = last.expect("no updates were broadcast");
    let stored = server.runtime.get_build_status(id).unwrap();
    assert_eq!(stored, last);
}

#[tokio::test]
async fn log_broadcasts_carry_task_output() {
    let server = server();
    let mut rx = server.runtime.subscribe();
    let id = server
        .submit(Job::new("noisy", vec![Task::main(4, "echo streamed")]))
        .await;

    server.wait_terminal(id).await;

    let mut log_lines = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::BuildLog { build_id, entry } = msg {
            assert_eq!(build_id, id);
            log_lines.push(entry);
        }
    }
    // First the raw command, then the prefixed output line.
    assert_eq!(log_lines[0].task_id, 4);
    assert_eq!(log_lines[0].data, "echo streamed");
    assert!(log_lines
        .iter()
        .any(|entry| is_ms_prefixed(&entry.data, "streamed")));
}
