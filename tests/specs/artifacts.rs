// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact collection and build-config specs.

use crate::prelude::*;
use wake_core::{Job, Status, Task};

#[tokio::test]
async fn double_star_pattern_collects_nested_artifacts() {
    let server = server();
    let id = server
        .submit(
            Job::new(
                "artifacts",
                vec![Task::main(
                    1,
                    "mkdir -p out/sub && echo a > out/a.txt && echo b > out/sub/b.txt",
                )],
            )
            .with_artifacts(vec!["out/**".to_string()]),
        )
        .await;

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Finished);
    assert_eq!(update.artifacts, vec!["out/a.txt", "out/sub/b.txt"]);

    let artifacts_dir = server.runtime.deps().config.artifacts_dir(id);
    assert_eq!(
        std::fs::read_to_string(artifacts_dir.join("out/a.txt")).unwrap(),
        "a\n"
    );
    assert_eq!(
        std::fs::read_to_string(artifacts_dir.join("out/sub/b.txt")).unwrap(),
        "b\n"
    );
}

#[tokio::test]
async fn unmatched_artifact_pattern_does_not_fail_the_build() {
    let server = server();
    let id = server
        .submit(
            Job::new("no-output", vec![Task::main(1, "echo nothing to save")])
                .with_artifacts(vec!["dist/**".to_string()]),
        )
        .await;

    let update = server.wait_terminal(id).await;
    assert_eq!(update.status, Status::Finished);
    assert!(update.artifacts.is_empty());
}

#[tokio::test]
async fn build_config_prefers_the_effective_plan() {
    let server = server();
    let id = server
        .submit(Job::new("plan", vec![Task::main(1, "true")]))
        .await;
    server.wait_terminal(id).await;

    assert_eq!(
        server.runtime.get_build_config(id).unwrap(),
        "name: spec job\n"
    );

    let wakespace = server.runtime.deps().config.wakespace_dir(id);
    std::fs::write(wakespace.join("build_plan.yaml"), "resolved: plan\n").unwrap();
    assert_eq!(
        server.runtime.get_build_config(id).unwrap(),
        "resolved: plan\n"
    );
}
