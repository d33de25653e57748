// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable build history keyed by build ID.
//!
//! Two trees in one sled database: `history` maps big-endian 8-byte build
//! IDs to JSON-encoded [`BuildUpdate`] records (so iteration order is
//! numeric order), and `global` holds the monotonic build-ID counter.
//! Counter allocation runs inside a transaction so the counter never
//! regresses, even under a crash mid-allocation.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use thiserror::Error;
use tracing::warn;
use wake_core::BuildUpdate;

/// Counter key in the `global` tree.
const COUNT_KEY: &[u8] = b"count";

/// Errors that can occur in history store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => StoreError::Sled(inner),
        }
    }
}

/// Durable map of build ID to the most recent [`BuildUpdate`], plus the
/// build-ID allocator.
pub struct HistoryStore {
    db: sled::Db,
    history: sled::Tree,
    global: sled::Tree,
}

impl HistoryStore {
    /// Open or create the store at the given directory.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let history = db.open_tree("history")?;
        let global = db.open_tree("global")?;
        Ok(Self {
            db,
            history,
            global,
        })
    }

    /// Allocate the next build ID.
    ///
    /// IDs start at 1 and increase strictly, including across process
    /// restarts. The read-increment-write runs in a transaction.
    pub fn next_build_id(&self) -> Result<u64, StoreError> {
        let id = self.global.transaction(|tx| {
            let next = match tx.get(COUNT_KEY)? {
                Some(raw) => {
                    decode_id(&raw).map_err(ConflictableTransactionError::Abort)? + 1
                }
                None => 1,
            };
            tx.insert(COUNT_KEY, next.to_be_bytes().to_vec())?;
            Ok(next)
        })?;
        Ok(id)
    }

    /// Write or overwrite the record for a build.
    pub fn put(&self, update: &BuildUpdate) -> Result<(), StoreError> {
        let value = serde_json::to_vec(update)?;
        let key = update.id.to_be_bytes();
        self.history.insert(&key[..], value)?;
        Ok(())
    }

    /// Read the record for a build, if one exists.
    pub fn get(&self, id: u64) -> Result<Option<BuildUpdate>, StoreError> {
        let key = id.to_be_bytes();
        match self.history.get(&key[..])? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// The most recent `n` records, newest first.
    ///
    /// Corrupt records are skipped with a warning rather than failing the
    /// whole scan.
    pub fn latest(&self, n: usize) -> Result<Vec<BuildUpdate>, StoreError> {
        let mut records = Vec::with_capacity(n);
        for entry in self.history.iter().rev() {
            if records.len() == n {
                break;
            }
            let (key, raw) = entry?;
            match serde_json::from_slice(&raw) {
                Ok(update) => records.push(update),
                Err(e) => warn!(key = ?key, error = %e, "skipping corrupt history record"),
            }
        }
        Ok(records)
    }

    /// Number of history records currently stored.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Fsync all pending writes.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_id(raw: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("counter is {} bytes, want 8", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
