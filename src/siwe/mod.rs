// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet identity verification via SIWE (EIP-4361) signed messages.
//!
//! The verifier is a pure function over (message fields, signature): it
//! re-renders the canonical message text, recovers the signer with EIP-191
//! prefixed hashing, and pins domain/uri to the configured application
//! origin so a signature captured by a phishing site cannot be replayed
//! here. Nothing is persisted.

use std::str::FromStr;

use alloy::primitives::{Address, Signature};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Default acceptance window for `issued_at` (message max age).
const DEFAULT_MAX_AGE_SECS: i64 = 600;

/// Clock skew tolerance for messages timestamped slightly in the future.
const CLOCK_SKEW_SECS: i64 = 60;

/// SIWE message fields as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiweMessage {
    pub domain: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    /// RFC 3339 timestamp, kept verbatim: the rendered message must match
    /// the exact bytes the wallet signed.
    pub issued_at: String,
}

impl SiweMessage {
    /// Render the canonical EIP-4361 message text.
    pub fn to_message(&self) -> String {
        let mut out = format!(
            "{} wants you to sign in with your Ethereum account:\n{}\n",
            self.domain, self.address
        );
        match &self.statement {
            Some(statement) => {
                out.push('\n');
                out.push_str(statement);
                out.push('\n');
            }
            None => out.push('\n'),
        }
        out.push_str(&format!(
            "\nURI: {}\nVersion: {}\nChain ID: {}\nNonce: {}\nIssued At: {}",
            self.uri, self.version, self.chain_id, self.nonce, self.issued_at
        ));
        out
    }
}

/// A verified, normalized wallet signature.
///
/// Ephemeral: lives for the request/response cycle only. `address` is
/// lowercase for comparisons.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    pub address: String,
    pub signed_message: String,
    pub signature: String,
    pub chain_id: u64,
    pub issued_at: DateTime<Utc>,
}

// The raw signature must never end up in logs.
impl std::fmt::Debug for AuthSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSig")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("issued_at", &self.issued_at)
            .field("signature", &"<redacted>")
            .finish()
    }
}

/// Verification failures.
#[derive(Debug, thiserror::Error)]
pub enum SiweError {
    #[error("message domain {got:?} does not match application domain {expected:?}")]
    DomainMismatch { expected: String, got: String },

    #[error("message uri {got:?} does not match application uri {expected:?}")]
    UriMismatch { expected: String, got: String },

    #[error("issued-at timestamp is malformed: {0}")]
    MalformedTimestamp(String),

    #[error("message issued in the future")]
    IssuedInFuture,

    #[error("message issued too long ago")]
    StaleMessage,

    #[error("malformed address: {0}")]
    MalformedAddress(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("recovered signer {recovered} does not match claimed address {claimed}")]
    AddressMismatch { claimed: String, recovered: String },
}

impl SiweError {
    /// Whether this failure is a claim-freshness problem rather than a
    /// signature problem. Drives the API error kind.
    pub fn is_expiry(&self) -> bool {
        matches!(self, SiweError::IssuedInFuture | SiweError::StaleMessage)
    }
}

/// Verifies SIWE messages against a pinned application origin.
#[derive(Debug, Clone)]
pub struct SiweVerifier {
    domain: String,
    uri: String,
    max_age: Duration,
    clock_skew: Duration,
}

impl SiweVerifier {
    pub fn new(domain: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            uri: uri.into(),
            max_age: Duration::seconds(DEFAULT_MAX_AGE_SECS),
            clock_skew: Duration::seconds(CLOCK_SKEW_SECS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Verify a signed message and return the normalized `AuthSig`.
    pub fn verify(&self, message: &SiweMessage, signature: &str) -> Result<AuthSig, SiweError> {
        if message.domain != self.domain {
            return Err(SiweError::DomainMismatch {
                expected: self.domain.clone(),
                got: message.domain.clone(),
            });
        }
        if message.uri != self.uri {
            return Err(SiweError::UriMismatch {
                expected: self.uri.clone(),
                got: message.uri.clone(),
            });
        }

        let issued_at = DateTime::parse_from_rfc3339(&message.issued_at)
            .map_err(|e| SiweError::MalformedTimestamp(e.to_string()))?
            .with_timezone(&Utc);
        let now = Utc::now();
        if issued_at > now + self.clock_skew {
            return Err(SiweError::IssuedInFuture);
        }
        if issued_at < now - self.max_age {
            return Err(SiweError::StaleMessage);
        }

        let claimed = Address::from_str(&message.address)
            .map_err(|e| SiweError::MalformedAddress(e.to_string()))?;

        let rendered = message.to_message();
        let sig = Signature::from_str(signature)
            .map_err(|e| SiweError::MalformedSignature(e.to_string()))?;
        let recovered = sig
            .recover_address_from_msg(rendered.as_bytes())
            .map_err(|e| SiweError::MalformedSignature(e.to_string()))?;

        if recovered != claimed {
            return Err(SiweError::AddressMismatch {
                claimed: format!("{claimed:#x}"),
                recovered: format!("{recovered:#x}"),
            });
        }

        Ok(AuthSig {
            address: format!("{claimed:#x}"),
            signed_message: rendered,
            signature: signature.to_string(),
            chain_id: message.chain_id,
            issued_at,
        })
    }
}
