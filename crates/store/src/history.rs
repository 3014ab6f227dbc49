// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Append-only, capped log of deploy attempts backed by one JSON file.
//!
//! Deliberately not transactional: the process is the single writer, the
//! file is small, and every mutation rewrites it whole. Loading is
//! best-effort — a missing file, unparseable JSON, or a non-array payload
//! all start an empty history rather than refusing to boot.

use ghfleet_core::{DeployRecord, DeployStatus, DeployTrigger};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Maximum records retained; older entries are trimmed from the head.
pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write history {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct DeployHistory {
    path: PathBuf,
    records: Vec<DeployRecord>,
}

impl DeployHistory {
    /// Load from `path`, tolerating absence and corruption.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<DeployRecord>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable deploy history, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, records }
    }

    pub fn records(&self) -> &[DeployRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&DeployRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Most recent record with status `completed`.
    pub fn last_successful(&self) -> Option<&DeployRecord> {
        self.records.iter().rev().find(|r| r.status == DeployStatus::Completed)
    }

    /// Append and persist, trimming from the head past [`HISTORY_CAP`].
    pub fn add(&mut self, record: DeployRecord) -> Result<(), StoreError> {
        self.records.push(record);
        if self.records.len() > HISTORY_CAP {
            let excess = self.records.len() - HISTORY_CAP;
            self.records.drain(..excess);
        }
        self.save()
    }

    /// Replace the record with the same id and persist. Unknown ids are a
    /// no-op apart from the rewrite.
    pub fn update(&mut self, record: &DeployRecord) -> Result<(), StoreError> {
        if let Some(existing) = self.records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        }
        self.save()
    }

    /// Build a new `deploying` record, capturing the rollback target from
    /// the last successful deploy at this moment.
    pub fn create_record(
        &self,
        image_tag: &str,
        trigger: DeployTrigger,
        commit_sha: Option<String>,
        started_at_ms: u64,
    ) -> DeployRecord {
        let previous = self.last_successful().map(|r| r.image_tag.clone());
        DeployRecord::new(image_tag, trigger, commit_sha, previous, started_at_ms)
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Write { path: self.path.clone(), source: e })?;
            }
        }
        let encoded = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.path, encoded)
            .map_err(|e| StoreError::Write { path: self.path.clone(), source: e })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
