// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Authenticated user information extracted from the identity JWT.
///
/// The primary type used throughout the application to represent the
/// user making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (Clerk `sub` claim)
    pub user_id: String,

    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Original issuer; not serialized
    #[serde(skip)]
    pub issuer: String,

    /// Token expiration (unix seconds); not serialized
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
