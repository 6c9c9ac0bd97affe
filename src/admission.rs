// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admission coordination.
//!
//! Verification order is fixed: gate token first (cheapest, catches
//! forgeries and expiry), then the SIWE wallet signature, then the
//! wallet binding between the two, then the atomic consume-and-grant in
//! the database. Each step must pass before the next runs; nothing is
//! persisted until the final step commits.

use std::sync::Arc;

use crate::error::ApiError;
use crate::gate_token::{GateClaims, GateTokenError, GateTokenSigner};
use crate::siwe::{SiweMessage, SiweVerifier};
use crate::storage::{AdmissionOutcome, GateDatabase, GateDbError, StoredTokenGate};

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("gate token rejected: {0}")]
    GateToken(#[from] GateTokenError),

    #[error("wallet signature rejected: {0}")]
    WalletSignature(#[from] crate::siwe::SiweError),

    #[error("signing wallet does not match the evaluated wallet")]
    WalletMismatch,

    #[error("gate not found")]
    GateNotFound,

    #[error("gate token already redeemed")]
    Replayed,

    #[error("storage error: {0}")]
    Db(GateDbError),
}

impl From<GateDbError> for AdmissionError {
    fn from(e: GateDbError) -> Self {
        match e {
            GateDbError::ReplayedNonce => AdmissionError::Replayed,
            other => AdmissionError::Db(other),
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(e: AdmissionError) -> Self {
        match e {
            AdmissionError::GateToken(GateTokenError::Expired) => {
                ApiError::expired_claim("Gate token has expired")
            }
            AdmissionError::GateToken(_) => {
                ApiError::invalid_signature("Gate token signature is invalid")
            }
            AdmissionError::WalletSignature(ref siwe) if siwe.is_expiry() => {
                ApiError::expired_claim("Wallet signature is stale")
            }
            AdmissionError::WalletSignature(_) => {
                ApiError::invalid_signature("Wallet signature is invalid")
            }
            AdmissionError::WalletMismatch => ApiError::wallet_mismatch(
                "Signing wallet does not match the wallet the gate token was issued for",
            ),
            AdmissionError::GateNotFound => ApiError::gate_not_found("Gate not found"),
            AdmissionError::Replayed => {
                ApiError::replayed_token("Gate token has already been redeemed")
            }
            AdmissionError::Db(e) => ApiError::internal(format!("Admission failed: {e}")),
        }
    }
}

/// Runs the full verification chain and commits membership.
pub struct AdmissionCoordinator {
    db: Arc<GateDatabase>,
    gate_tokens: Arc<GateTokenSigner>,
    siwe: Arc<SiweVerifier>,
}

impl AdmissionCoordinator {
    pub fn new(
        db: Arc<GateDatabase>,
        gate_tokens: Arc<GateTokenSigner>,
        siwe: Arc<SiweVerifier>,
    ) -> Self {
        Self {
            db,
            gate_tokens,
            siwe,
        }
    }

    /// Verify a gate token plus wallet signature for `user_id` and, if
    /// everything holds, consume the token's nonce and grant membership
    /// atomically.
    pub fn verify_and_admit(
        &self,
        user_id: &str,
        gate_token: &str,
        message: &SiweMessage,
        signature: &str,
    ) -> Result<(StoredTokenGate, GateClaims, AdmissionOutcome), AdmissionError> {
        let claims = self.gate_tokens.verify(gate_token)?;
        let auth_sig = self.siwe.verify(message, signature)?;

        // Both sides are lowercase hex already; compare defensively anyway
        if !auth_sig.address.eq_ignore_ascii_case(&claims.wallet_address) {
            return Err(AdmissionError::WalletMismatch);
        }

        let gate = self
            .db
            .get_gate(&claims.gate_id)?
            .ok_or(AdmissionError::GateNotFound)?;
        if gate.is_deleted() {
            return Err(AdmissionError::GateNotFound);
        }

        let outcome = self.db.admit(
            &claims.nonce,
            claims.expires_at,
            user_id,
            &gate.space_id,
            &claims.wallet_address,
            &gate.linked_role_ids,
        )?;

        Ok((gate, claims, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{AssetStandard, Comparator, ConditionNode, LeafCondition};
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use chrono::Utc;

    const APP_DOMAIN: &str = "app.example.com";
    const APP_URI: &str = "https://app.example.com";

    fn coordinator() -> (AdmissionCoordinator, Arc<GateDatabase>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(GateDatabase::open(&dir.path().join("test.redb")).unwrap());
        let coordinator = AdmissionCoordinator::new(
            db.clone(),
            Arc::new(GateTokenSigner::new(b"test-secret", 300)),
            Arc::new(SiweVerifier::new(APP_DOMAIN, APP_URI)),
        );
        (coordinator, db, dir)
    }

    fn insert_gate(db: &GateDatabase, gate_id: &str, roles: &[&str]) {
        db.insert_gate(&StoredTokenGate {
            gate_id: gate_id.to_string(),
            space_id: "space-1".to_string(),
            condition_tree: ConditionNode::Leaf(LeafCondition {
                chain: "ethereum".to_string(),
                contract_address: None,
                asset_standard: AssetStandard::Native,
                token_id: None,
                method: None,
                comparator: Comparator::Gte,
                quantity: "1".to_string(),
            }),
            linked_role_ids: roles.iter().map(|r| r.to_string()).collect(),
            created_by: "admin-1".to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        })
        .unwrap();
    }

    fn signed_message(signer: &PrivateKeySigner) -> (SiweMessage, String) {
        let message = SiweMessage {
            domain: APP_DOMAIN.to_string(),
            address: format!("{:#x}", signer.address()),
            statement: None,
            uri: APP_URI.to_string(),
            version: "1".to_string(),
            chain_id: 1,
            nonce: "k9mPqR2vXw".to_string(),
            issued_at: Utc::now().to_rfc3339(),
        };
        let sig = signer
            .sign_message_sync(message.to_message().as_bytes())
            .unwrap();
        let signature = format!("0x{}", alloy::hex::encode(sig.as_bytes()));
        (message, signature)
    }

    #[test]
    fn full_chain_grants_membership() {
        let (coordinator, db, _dir) = coordinator();
        insert_gate(&db, "gate-1", &["role-holder"]);

        let wallet = PrivateKeySigner::random();
        let (token, _) = coordinator
            .gate_tokens
            .mint("gate-1", &format!("{:#x}", wallet.address()));
        let (message, signature) = signed_message(&wallet);

        let (gate, claims, outcome) = coordinator
            .verify_and_admit("user-1", &token, &message, &signature)
            .expect("admission succeeds");

        assert_eq!(gate.space_id, "space-1");
        assert_eq!(claims.gate_id, "gate-1");
        assert!(outcome.created);
        assert_eq!(outcome.membership.roles, vec!["role-holder"]);

        let stored = db.get_membership("user-1", "space-1").unwrap().unwrap();
        assert_eq!(stored.wallet_address, format!("{:#x}", wallet.address()));
    }

    #[test]
    fn replayed_token_is_rejected_after_first_use() {
        let (coordinator, db, _dir) = coordinator();
        insert_gate(&db, "gate-1", &["role-holder"]);

        let wallet = PrivateKeySigner::random();
        let (token, _) = coordinator
            .gate_tokens
            .mint("gate-1", &format!("{:#x}", wallet.address()));
        let (message, signature) = signed_message(&wallet);

        coordinator
            .verify_and_admit("user-1", &token, &message, &signature)
            .unwrap();
        let err = coordinator
            .verify_and_admit("user-1", &token, &message, &signature)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Replayed));
    }

    #[test]
    fn wallet_mismatch_is_rejected_before_any_write() {
        let (coordinator, db, _dir) = coordinator();
        insert_gate(&db, "gate-1", &["role-holder"]);

        // Token minted for one wallet, message signed by another
        let evaluated = PrivateKeySigner::random();
        let signer = PrivateKeySigner::random();
        let (token, claims) = coordinator
            .gate_tokens
            .mint("gate-1", &format!("{:#x}", evaluated.address()));
        let (message, signature) = signed_message(&signer);

        let err = coordinator
            .verify_and_admit("user-1", &token, &message, &signature)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::WalletMismatch));

        // No membership, and the nonce is still fresh
        assert!(db.get_membership("user-1", "space-1").unwrap().is_none());
        assert!(db
            .admit(&claims.nonce, claims.expires_at, "u", "s", "0xaa", &[])
            .is_ok());
    }

    #[test]
    fn forged_token_is_rejected() {
        let (coordinator, db, _dir) = coordinator();
        insert_gate(&db, "gate-1", &[]);

        let wallet = PrivateKeySigner::random();
        let forger = GateTokenSigner::new(b"other-secret", 300);
        let (token, _) = forger.mint("gate-1", &format!("{:#x}", wallet.address()));
        let (message, signature) = signed_message(&wallet);

        let err = coordinator
            .verify_and_admit("user-1", &token, &message, &signature)
            .unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::GateToken(GateTokenError::InvalidSignature)
        ));
    }

    #[test]
    fn deleted_gate_is_not_found() {
        let (coordinator, db, _dir) = coordinator();
        insert_gate(&db, "gate-1", &[]);

        let wallet = PrivateKeySigner::random();
        let (token, _) = coordinator
            .gate_tokens
            .mint("gate-1", &format!("{:#x}", wallet.address()));
        db.soft_delete_gate("gate-1").unwrap();

        let (message, signature) = signed_message(&wallet);
        let err = coordinator
            .verify_and_admit("user-1", &token, &message, &signature)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::GateNotFound));
    }

    #[test]
    fn error_mapping_matches_api_taxonomy() {
        use axum::http::StatusCode;

        let cases: Vec<(AdmissionError, StatusCode, &str)> = vec![
            (
                AdmissionError::GateToken(GateTokenError::Expired),
                StatusCode::UNAUTHORIZED,
                "expired_claim",
            ),
            (
                AdmissionError::GateToken(GateTokenError::InvalidSignature),
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
            ),
            (
                AdmissionError::WalletMismatch,
                StatusCode::FORBIDDEN,
                "wallet_mismatch",
            ),
            (
                AdmissionError::GateNotFound,
                StatusCode::NOT_FOUND,
                "gate_not_found",
            ),
            (
                AdmissionError::Replayed,
                StatusCode::CONFLICT,
                "replayed_token",
            ),
        ];
        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.error_code, code);
        }
    }
}
