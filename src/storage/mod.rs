// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for gates, memberships, consumed nonces, and audit trails.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   gates.redb           # Embedded ACID database (gates, memberships, nonces)
//!   audit/
//!     events_{date}.jsonl  # Daily audit logs
//! ```
//!
//! The database is redb: pure Rust, single file, serialized write
//! transactions. Admission correctness (nonce single-use plus membership
//! grant) relies on that serialization; see [`gate_db::GateDatabase::admit`].

pub mod audit;
pub mod gate_db;
pub mod paths;
pub mod records;

pub use audit::{AuditEvent, AuditEventType, AuditLog};
pub use gate_db::{AdmissionOutcome, GateDatabase, GateDbError, GateDbResult};
pub use paths::StoragePaths;
pub use records::{StoredMembership, StoredTokenGate};
