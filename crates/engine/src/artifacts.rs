// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact collection from a build workspace.

use std::io;
use std::path::Path;
use tracing::warn;

/// Result of expanding and copying a job's artifact patterns.
#[derive(Debug, Default)]
pub struct Collected {
    /// Workspace-relative paths copied successfully, sorted
    pub copied: Vec<String>,
    /// Per-file failures: (path or pattern, error text)
    pub failures: Vec<(String, String)>,
}

/// Expand each glob pattern against the workspace root and copy matching
/// files into `dest`, preserving relative directory structure.
///
/// `**` matches any number of path components. Directories are skipped.
/// Per-file failures are collected, never fatal.
pub fn collect(workspace: &Path, dest: &Path, patterns: &[String]) -> Collected {
    let mut result = Collected::default();

    for pattern in patterns {
        let full = workspace.join(pattern);
        let Some(full) = full.to_str() else {
            result
                .failures
                .push((pattern.clone(), "non-UTF-8 pattern path".to_string()));
            continue;
        };
        let paths = match glob::glob(full) {
            Ok(paths) => paths,
            Err(e) => {
                result.failures.push((pattern.clone(), e.to_string()));
                continue;
            }
        };

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    result.failures.push((pattern.clone(), e.to_string()));
                    continue;
                }
            };
            if path.is_dir() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(workspace) else {
                warn!(path = %path.display(), "glob match outside workspace, skipping");
                continue;
            };
            let rel_str = rel.display().to_string();
            match copy_one(&path, &dest.join(rel)) {
                Ok(()) => result.copied.push(rel_str),
                Err(e) => result.failures.push((rel_str, e.to_string())),
            }
        }
    }

    result.copied.sort();
    result
}

fn copy_one(src: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, target)?;
    Ok(())
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
