// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire DTOs for the admission API.
//!
//! Storage records live in `crate::storage::records`; these types define
//! the JSON surface and carry the OpenAPI schema annotations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::conditions::ConditionNode;
use crate::siwe::SiweMessage;
use crate::storage::{StoredMembership, StoredTokenGate};

/// A token gate as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenGate {
    pub gate_id: String,
    pub space_id: String,
    pub condition_tree: ConditionNode,
    pub linked_role_ids: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<StoredTokenGate> for TokenGate {
    fn from(stored: StoredTokenGate) -> Self {
        Self {
            gate_id: stored.gate_id,
            space_id: stored.space_id,
            condition_tree: stored.condition_tree,
            linked_role_ids: stored.linked_role_ids,
            created_by: stored.created_by,
            created_at: stored.created_at,
            deleted_at: stored.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenGateRequest {
    pub space_id: String,
    pub condition_tree: ConditionNode,
    /// Role ids granted on admission through this gate
    #[serde(default)]
    pub linked_role_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub space_id: String,
    /// Wallet the conditions are checked against; control of it is proven
    /// later, at verification
    pub wallet_address: String,
}

/// One passing gate and its signed admission token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GateTokenGrant {
    pub token_gate: TokenGate,
    pub signed_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub user_id: String,
    pub space_id: String,
    pub wallet_address: String,
    /// True when at least one gate of the space passed
    pub can_join_space: bool,
    /// A signed token per passing gate
    pub gate_tokens: Vec<GateTokenGrant>,
    /// Union of role ids the passing gates would grant
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Signed gate token from a prior evaluation
    pub gate_token: String,
    /// SIWE message the wallet signed
    pub message: SiweMessage,
    /// EIP-191 signature over the rendered message
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub membership: Membership,
}

/// A user's membership in a space.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: String,
    pub space_id: String,
    pub wallet_address: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredMembership> for Membership {
    fn from(stored: StoredMembership) -> Self {
        Self {
            user_id: stored.user_id,
            space_id: stored.space_id,
            wallet_address: stored.wallet_address,
            roles: stored.roles,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_parses_camel_case() {
        let json = r#"{
            "spaceId": "space-1",
            "conditionTree": {
                "kind": "leaf",
                "chain": "ethereum",
                "assetStandard": "NATIVE",
                "comparator": ">=",
                "quantity": "1000000000000000000"
            },
            "linkedRoleIds": ["role-holder"]
        }"#;
        let request: CreateTokenGateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.space_id, "space-1");
        assert_eq!(request.linked_role_ids, vec!["role-holder"]);
    }

    #[test]
    fn linked_role_ids_default_to_empty() {
        let json = r#"{
            "spaceId": "space-1",
            "conditionTree": {
                "kind": "leaf",
                "chain": "ethereum",
                "assetStandard": "NATIVE",
                "comparator": ">=",
                "quantity": "1"
            }
        }"#;
        let request: CreateTokenGateRequest = serde_json::from_str(json).unwrap();
        assert!(request.linked_role_ids.is_empty());
    }
}
