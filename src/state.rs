// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.

use std::sync::Arc;

use crate::auth::JwksManager;
use crate::chain::{BalanceOracle, ChainRegistry};
use crate::conditions::evaluator::Evaluator;
use crate::gate_token::GateTokenSigner;
use crate::siwe::SiweVerifier;
use crate::storage::{AuditLog, GateDatabase};

/// Identity-provider verification settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// JWKS manager; `None` selects development mode (no signature check)
    pub jwks: Option<JwksManager>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// State shared across all request handlers. Cheap to clone; every field
/// is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<GateDatabase>,
    pub chains: Arc<ChainRegistry>,
    pub evaluator: Arc<Evaluator>,
    pub siwe: Arc<SiweVerifier>,
    pub gate_tokens: Arc<GateTokenSigner>,
    pub audit: Arc<AuditLog>,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(
        db: GateDatabase,
        chains: ChainRegistry,
        oracle: Arc<dyn BalanceOracle>,
        siwe: SiweVerifier,
        gate_tokens: GateTokenSigner,
        audit: AuditLog,
    ) -> Self {
        Self {
            db: Arc::new(db),
            chains: Arc::new(chains),
            evaluator: Arc::new(Evaluator::new(oracle)),
            siwe: Arc::new(siwe),
            gate_tokens: Arc::new(gate_tokens),
            audit: Arc::new(audit),
            auth_config: Arc::new(AuthConfig {
                jwks: None,
                issuer: None,
                audience: None,
            }),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = Arc::new(auth_config);
        self
    }

    /// Swap the evaluator, keeping everything else. Tests use this to
    /// inject a mock oracle.
    pub fn with_oracle(mut self, oracle: Arc<dyn BalanceOracle>) -> Self {
        self.evaluator = Arc::new(Evaluator::new(oracle));
        self
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::chain::RpcBalanceOracle;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    /// AppState over a temp directory, development auth, no JWKS.
    pub fn test_state() -> (AppState, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let paths = StoragePaths::new(temp.path());
        let db = GateDatabase::open(&paths.gates_db_file()).expect("open db");
        let chains = ChainRegistry::from_env();
        let oracle: Arc<dyn BalanceOracle> = Arc::new(RpcBalanceOracle::new(chains.clone()));

        let state = AppState::new(
            db,
            chains,
            oracle,
            SiweVerifier::new("app.example.com", "https://app.example.com"),
            GateTokenSigner::new(b"test-secret", 300),
            AuditLog::new(paths),
        )
        .with_auth_config(AuthConfig {
            jwks: None,
            issuer: Some("test".to_string()),
            audience: None,
        });
        (state, temp)
    }
}
