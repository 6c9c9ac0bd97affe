// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gate token issuing and verification.
//!
//! A gate token is the server's signed assertion that a wallet passed a
//! gate's evaluation at a point in time. It binds (gate, wallet, nonce)
//! under an HMAC so clients cannot forge "I passed"; it carries no leaf
//! detail, so it also does not leak the gate's condition internals. Expiry
//! is short because the underlying on-chain snapshot goes stale quickly.
//! Single-use enforcement (nonce consumption) happens in the admission
//! coordinator, not here.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside a signed gate token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GateClaims {
    pub gate_id: String,
    /// Lowercase wallet address the evaluation ran for
    pub wallet_address: String,
    /// Single-use nonce, consumed atomically at verification
    pub nonce: String,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

/// Gate token failures. Terminal; never retried server-side.
#[derive(Debug, thiserror::Error)]
pub enum GateTokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,
}

/// Mints and verifies HMAC-signed gate tokens.
///
/// Wire format: `base64url(claims_json).base64url(hmac_sha256)`.
#[derive(Clone)]
pub struct GateTokenSigner {
    key: Vec<u8>,
    ttl_secs: i64,
}

impl GateTokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Mint a token for a passed evaluation.
    pub fn mint(&self, gate_id: &str, wallet_address: &str) -> (String, GateClaims) {
        let now = Utc::now().timestamp();
        let claims = GateClaims {
            gate_id: gate_id.to_string(),
            wallet_address: wallet_address.to_lowercase(),
            nonce: uuid::Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: now + self.ttl_secs,
        };

        // Claims are plain old data; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).expect("gate claims serialize");
        let payload_b64 = Base64UrlUnpadded::encode_string(&payload);
        let mac_b64 = Base64UrlUnpadded::encode_string(&self.mac(payload_b64.as_bytes()));

        (format!("{payload_b64}.{mac_b64}"), claims)
    }

    /// Verify signature and expiry; returns the claims on success.
    ///
    /// The MAC comparison is constant-time (`Mac::verify_slice`). Nonce
    /// consumption is the caller's job.
    pub fn verify(&self, token: &str) -> Result<GateClaims, GateTokenError> {
        let (payload_b64, mac_b64) = token.split_once('.').ok_or(GateTokenError::Malformed)?;
        let mac_bytes =
            Base64UrlUnpadded::decode_vec(mac_b64).map_err(|_| GateTokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&mac_bytes)
            .map_err(|_| GateTokenError::InvalidSignature)?;

        let payload =
            Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| GateTokenError::Malformed)?;
        let claims: GateClaims =
            serde_json::from_slice(&payload).map_err(|_| GateTokenError::Malformed)?;

        if claims.expires_at < Utc::now().timestamp() {
            return Err(GateTokenError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
