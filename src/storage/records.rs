// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted record shapes for the gate database.
//!
//! These are storage-layer types; the API layer maps them to wire DTOs in
//! `crate::models`. Field changes here are a schema migration concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conditions::ConditionNode;

/// A token gate as persisted.
///
/// Gates are immutable after creation; the only lifecycle transition is
/// the soft delete, which sets `deleted_at` and removes the gate from
/// evaluation without losing the historical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokenGate {
    pub gate_id: String,
    pub space_id: String,
    pub condition_tree: ConditionNode,
    /// Role ids granted on admission through this gate
    pub linked_role_ids: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredTokenGate {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A user's membership in a space, created or extended by admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMembership {
    pub user_id: String,
    pub space_id: String,
    /// Wallet that passed the gate; lowercase
    pub wallet_address: String,
    /// Sorted, deduplicated
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{AssetStandard, Comparator, ConditionNode, LeafCondition};

    fn native_leaf() -> ConditionNode {
        ConditionNode::Leaf(LeafCondition {
            chain: "ethereum".to_string(),
            contract_address: None,
            asset_standard: AssetStandard::Native,
            token_id: None,
            method: None,
            comparator: Comparator::Gte,
            quantity: "1".to_string(),
        })
    }

    #[test]
    fn gate_record_round_trips_through_json() {
        let gate = StoredTokenGate {
            gate_id: "gate-1".to_string(),
            space_id: "space-1".to_string(),
            condition_tree: native_leaf(),
            linked_role_ids: vec!["role-a".to_string()],
            created_by: "user-1".to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };

        let json = serde_json::to_string(&gate).unwrap();
        let back: StoredTokenGate = serde_json::from_str(&json).unwrap();
        assert_eq!(back.gate_id, "gate-1");
        assert!(!back.is_deleted());
    }
}
