// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded gate database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `token_gates`: gate_id → serialized StoredTokenGate
//! - `space_gate_index`: composite key (space_id|gate_id) → gate_id
//! - `consumed_nonces`: nonce → token expiry (unix seconds)
//! - `memberships`: composite key (user_id|space_id) → serialized StoredMembership
//!
//! Replay rejection and membership grants happen inside a single write
//! transaction in [`GateDatabase::admit`]; redb serializes write
//! transactions, so two concurrent verifications of the same token cannot
//! both observe the nonce as fresh.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::records::{StoredMembership, StoredTokenGate};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: gate_id → serialized StoredTokenGate (JSON bytes).
const TOKEN_GATES: TableDefinition<&str, &[u8]> = TableDefinition::new("token_gates");

/// Index: composite key (space_id|gate_id) → gate_id.
const SPACE_GATE_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("space_gate_index");

/// Consumed gate token nonces: nonce → token expiry (unix seconds).
/// The expiry bounds retention; entries past it can never replay anyway.
const CONSUMED_NONCES: TableDefinition<&str, i64> = TableDefinition::new("consumed_nonces");

/// Memberships: composite key (user_id|space_id) → serialized StoredMembership.
const MEMBERSHIPS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("memberships");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GateDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("nonce already consumed")]
    ReplayedNonce,
}

pub type GateDbResult<T> = Result<T, GateDbError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Composite key `left|right` for the index and membership tables.
fn make_composite_key(left: &str, right: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(left.len() + 1 + right.len());
    key.extend_from_slice(left.as_bytes());
    key.push(b'|');
    key.extend_from_slice(right.as_bytes());
    key
}

/// Prefix for range scanning all entries under `left|`.
fn make_prefix(left: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(left.len() + 1);
    prefix.extend_from_slice(left.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a prefix range scan.
fn make_prefix_end(left: &str) -> Vec<u8> {
    let mut end = make_prefix(left);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// Admission Outcome
// =============================================================================

/// Result of a committed admission.
#[derive(Debug, Clone)]
pub struct AdmissionOutcome {
    pub membership: StoredMembership,
    /// True when the membership did not exist before this admission.
    pub created: bool,
}

// =============================================================================
// GateDatabase
// =============================================================================

/// Embedded ACID gate and membership database.
pub struct GateDatabase {
    db: Database,
}

impl GateDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> GateDbResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TOKEN_GATES)?;
            let _ = write_txn.open_table(SPACE_GATE_INDEX)?;
            let _ = write_txn.open_table(CONSUMED_NONCES)?;
            let _ = write_txn.open_table(MEMBERSHIPS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Gates
    // =========================================================================

    /// Persist a newly created gate and its space index entry.
    pub fn insert_gate(&self, gate: &StoredTokenGate) -> GateDbResult<()> {
        let json = serde_json::to_vec(gate)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut gates = write_txn.open_table(TOKEN_GATES)?;
            gates.insert(gate.gate_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(SPACE_GATE_INDEX)?;
            let key = make_composite_key(&gate.space_id, &gate.gate_id);
            index.insert(key.as_slice(), gate.gate_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a single gate by id, deleted or not.
    pub fn get_gate(&self, gate_id: &str) -> GateDbResult<Option<StoredTokenGate>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TOKEN_GATES)?;
        match table.get(gate_id)? {
            Some(value) => {
                let gate: StoredTokenGate = serde_json::from_slice(value.value())?;
                Ok(Some(gate))
            }
            None => Ok(None),
        }
    }

    /// All gates registered for a space, in insertion-id order.
    pub fn list_gates_for_space(
        &self,
        space_id: &str,
        include_deleted: bool,
    ) -> GateDbResult<Vec<StoredTokenGate>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(SPACE_GATE_INDEX)?;
        let gates = read_txn.open_table(TOKEN_GATES)?;

        let prefix = make_prefix(space_id);
        let prefix_end = make_prefix_end(space_id);

        let mut results = Vec::new();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            let gate_id = entry.1.value().to_string();
            if let Some(value) = gates.get(gate_id.as_str())? {
                let gate: StoredTokenGate = serde_json::from_slice(value.value())?;
                if include_deleted || !gate.is_deleted() {
                    results.push(gate);
                }
            }
        }
        Ok(results)
    }

    /// Soft-delete a gate. Idempotent on already-deleted gates.
    pub fn soft_delete_gate(&self, gate_id: &str) -> GateDbResult<StoredTokenGate> {
        let write_txn = self.db.begin_write()?;
        let gate = {
            let mut table = write_txn.open_table(TOKEN_GATES)?;

            let existing_bytes = {
                let existing = table
                    .get(gate_id)?
                    .ok_or_else(|| GateDbError::NotFound(format!("Gate {gate_id}")))?;
                existing.value().to_vec()
            };

            let mut gate: StoredTokenGate = serde_json::from_slice(&existing_bytes)?;
            if gate.deleted_at.is_none() {
                gate.deleted_at = Some(Utc::now());
                let json = serde_json::to_vec(&gate)?;
                table.insert(gate_id, json.as_slice())?;
            }
            gate
        };
        write_txn.commit()?;
        Ok(gate)
    }

    // =========================================================================
    // Memberships
    // =========================================================================

    pub fn get_membership(
        &self,
        user_id: &str,
        space_id: &str,
    ) -> GateDbResult<Option<StoredMembership>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMBERSHIPS)?;
        let key = make_composite_key(user_id, space_id);
        match table.get(key.as_slice())? {
            Some(value) => {
                let membership: StoredMembership = serde_json::from_slice(value.value())?;
                Ok(Some(membership))
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Consume a gate token nonce and grant membership, atomically.
    ///
    /// One write transaction covers both steps: if the nonce was already
    /// consumed the transaction aborts with [`GateDbError::ReplayedNonce`]
    /// and the membership is untouched. Otherwise the membership is created
    /// if absent, and `roles` are unioned into it (sorted, deduplicated).
    /// Re-running with a fresh nonce and identical roles is a no-op on the
    /// membership except for `updated_at`.
    pub fn admit(
        &self,
        nonce: &str,
        nonce_expires_at: i64,
        user_id: &str,
        space_id: &str,
        wallet_address: &str,
        roles: &[String],
    ) -> GateDbResult<AdmissionOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut nonces = write_txn.open_table(CONSUMED_NONCES)?;
            if nonces.get(nonce)?.is_some() {
                return Err(GateDbError::ReplayedNonce);
            }
            nonces.insert(nonce, nonce_expires_at)?;

            let mut memberships = write_txn.open_table(MEMBERSHIPS)?;
            let key = make_composite_key(user_id, space_id);

            let existing = match memberships.get(key.as_slice())? {
                Some(value) => Some(serde_json::from_slice::<StoredMembership>(value.value())?),
                None => None,
            };

            let now = Utc::now();
            let created = existing.is_none();
            let mut membership = existing.unwrap_or_else(|| StoredMembership {
                user_id: user_id.to_string(),
                space_id: space_id.to_string(),
                wallet_address: wallet_address.to_lowercase(),
                roles: Vec::new(),
                created_at: now,
                updated_at: now,
            });

            membership.roles.extend(roles.iter().cloned());
            membership.roles.sort();
            membership.roles.dedup();
            membership.updated_at = now;

            let json = serde_json::to_vec(&membership)?;
            memberships.insert(key.as_slice(), json.as_slice())?;

            AdmissionOutcome { membership, created }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Drop consumed nonces whose tokens expired before `cutoff`.
    ///
    /// Safe to run any time: an expired token fails signature-layer expiry
    /// checks regardless of nonce state.
    pub fn prune_consumed_nonces(&self, cutoff: i64) -> GateDbResult<u64> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CONSUMED_NONCES)?;
            let before = table.len()?;
            table.retain(|_, expires_at| expires_at >= cutoff)?;
            before - table.len()?
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{AssetStandard, Comparator, ConditionNode, LeafCondition};

    fn temp_db() -> (GateDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = GateDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_gate(gate_id: &str, space_id: &str) -> StoredTokenGate {
        StoredTokenGate {
            gate_id: gate_id.to_string(),
            space_id: space_id.to_string(),
            condition_tree: ConditionNode::Leaf(LeafCondition {
                chain: "ethereum".to_string(),
                contract_address: None,
                asset_standard: AssetStandard::Native,
                token_id: None,
                method: None,
                comparator: Comparator::Gte,
                quantity: "1000000000000000000".to_string(),
            }),
            linked_role_ids: vec!["role-member".to_string()],
            created_by: "admin-1".to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn insert_and_get_gate() {
        let (db, _dir) = temp_db();
        db.insert_gate(&sample_gate("g1", "s1")).unwrap();

        let gate = db.get_gate("g1").unwrap().unwrap();
        assert_eq!(gate.space_id, "s1");
        assert!(db.get_gate("missing").unwrap().is_none());
    }

    #[test]
    fn list_gates_scoped_to_space() {
        let (db, _dir) = temp_db();
        db.insert_gate(&sample_gate("g1", "s1")).unwrap();
        db.insert_gate(&sample_gate("g2", "s1")).unwrap();
        db.insert_gate(&sample_gate("g3", "s2")).unwrap();

        let s1 = db.list_gates_for_space("s1", false).unwrap();
        assert_eq!(s1.len(), 2);
        let s2 = db.list_gates_for_space("s2", false).unwrap();
        assert_eq!(s2.len(), 1);
        assert!(db.list_gates_for_space("s3", false).unwrap().is_empty());
    }

    #[test]
    fn space_prefix_does_not_leak_across_similar_ids() {
        let (db, _dir) = temp_db();
        db.insert_gate(&sample_gate("g1", "space")).unwrap();
        db.insert_gate(&sample_gate("g2", "space-long")).unwrap();

        let gates = db.list_gates_for_space("space", false).unwrap();
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].gate_id, "g1");
    }

    #[test]
    fn soft_delete_hides_gate_from_default_listing() {
        let (db, _dir) = temp_db();
        db.insert_gate(&sample_gate("g1", "s1")).unwrap();

        let deleted = db.soft_delete_gate("g1").unwrap();
        assert!(deleted.is_deleted());

        assert!(db.list_gates_for_space("s1", false).unwrap().is_empty());
        assert_eq!(db.list_gates_for_space("s1", true).unwrap().len(), 1);
        // Record is still retrievable by id
        assert!(db.get_gate("g1").unwrap().unwrap().is_deleted());
    }

    #[test]
    fn soft_delete_is_idempotent() {
        let (db, _dir) = temp_db();
        db.insert_gate(&sample_gate("g1", "s1")).unwrap();

        let first = db.soft_delete_gate("g1").unwrap();
        let second = db.soft_delete_gate("g1").unwrap();
        assert_eq!(first.deleted_at, second.deleted_at);
    }

    #[test]
    fn soft_delete_missing_gate_is_not_found() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            db.soft_delete_gate("missing"),
            Err(GateDbError::NotFound(_))
        ));
    }

    #[test]
    fn admit_creates_membership() {
        let (db, _dir) = temp_db();
        let roles = vec!["role-a".to_string()];
        let outcome = db
            .admit("nonce-1", 9_999_999_999, "u1", "s1", WALLET, &roles)
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.membership.roles, roles);
        assert_eq!(outcome.membership.wallet_address, WALLET);

        let stored = db.get_membership("u1", "s1").unwrap().unwrap();
        assert_eq!(stored.roles, roles);
    }

    #[test]
    fn admit_unions_roles_without_duplicates() {
        let (db, _dir) = temp_db();
        db.admit(
            "nonce-1",
            9_999_999_999,
            "u1",
            "s1",
            WALLET,
            &["role-b".to_string(), "role-a".to_string()],
        )
        .unwrap();

        let outcome = db
            .admit(
                "nonce-2",
                9_999_999_999,
                "u1",
                "s1",
                WALLET,
                &["role-a".to_string(), "role-c".to_string()],
            )
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(
            outcome.membership.roles,
            vec!["role-a", "role-b", "role-c"]
        );
    }

    #[test]
    fn replayed_nonce_is_rejected_and_membership_untouched() {
        let (db, _dir) = temp_db();
        db.admit(
            "nonce-1",
            9_999_999_999,
            "u1",
            "s1",
            WALLET,
            &["role-a".to_string()],
        )
        .unwrap();

        let err = db
            .admit(
                "nonce-1",
                9_999_999_999,
                "u1",
                "s1",
                WALLET,
                &["role-escalated".to_string()],
            )
            .unwrap_err();
        assert!(matches!(err, GateDbError::ReplayedNonce));

        let membership = db.get_membership("u1", "s1").unwrap().unwrap();
        assert_eq!(membership.roles, vec!["role-a"]);
    }

    #[test]
    fn concurrent_admits_of_one_nonce_have_a_single_winner() {
        use std::sync::{Arc, Barrier};

        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let db = db.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    db.admit(
                        "nonce-contested",
                        9_999_999_999,
                        &format!("u{i}"),
                        "s1",
                        WALLET,
                        &["role-a".to_string()],
                    )
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one admit may consume the nonce");
        for lost in outcomes.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                lost.as_ref().unwrap_err(),
                GateDbError::ReplayedNonce
            ));
        }
    }

    #[test]
    fn memberships_are_scoped_per_space() {
        let (db, _dir) = temp_db();
        db.admit(
            "nonce-1",
            9_999_999_999,
            "u1",
            "s1",
            WALLET,
            &["role-a".to_string()],
        )
        .unwrap();

        assert!(db.get_membership("u1", "s2").unwrap().is_none());
        assert!(db.get_membership("u2", "s1").unwrap().is_none());
    }

    #[test]
    fn prune_drops_only_expired_nonces() {
        let (db, _dir) = temp_db();
        db.admit("old", 100, "u1", "s1", WALLET, &[]).unwrap();
        db.admit("fresh", 9_999_999_999, "u1", "s1", WALLET, &[])
            .unwrap();

        let removed = db.prune_consumed_nonces(1_000).unwrap();
        assert_eq!(removed, 1);

        // The fresh nonce still blocks replay
        assert!(matches!(
            db.admit("fresh", 9_999_999_999, "u1", "s1", WALLET, &[]),
            Err(GateDbError::ReplayedNonce)
        ));
    }
}
