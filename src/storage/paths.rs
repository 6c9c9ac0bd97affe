// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem layout under the data directory.
//!
//! ```text
//! {root}/
//!   gates.redb       embedded gate/membership database
//!   audit/
//!     events_{date}.jsonl
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the embedded database file.
    pub fn gates_db_file(&self) -> PathBuf {
        self.root.join("gates.redb")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Daily audit log file, `date` formatted as `YYYY-MM-DD`.
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_dir().join(format!("events_{date}.jsonl"))
    }
}
