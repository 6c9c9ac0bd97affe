// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain balance oracle: the injectable seam between the condition
//! evaluator and real RPC endpoints.
//!
//! The evaluator only ever sees the `BalanceOracle` trait, so tests swap in
//! a programmable mock and never touch the network. The production
//! implementation keeps one lazily-built `ChainClient` per chain and applies
//! a per-call timeout plus one bounded retry before giving up; the caller
//! treats a final error as a failed leaf (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::conditions::AssetStandard;

use super::client::{ChainClient, ChainClientError};
use super::ChainRegistry;

/// Per-call timeout for a single RPC attempt.
const LEAF_CALL_TIMEOUT_SECS: u64 = 10;

/// Backoff between the first attempt and the single retry.
const RETRY_BACKOFF_MS: u64 = 250;

/// A single-condition query: one (chain, contract, wallet) triple.
#[derive(Debug, Clone)]
pub struct BalanceQuery {
    pub chain: String,
    pub standard: AssetStandard,
    pub contract: Option<Address>,
    pub token_id: Option<U256>,
    pub wallet: Address,
}

/// Answers single-condition queries against a chain.
///
/// `observe` returns the numeric value the comparator is applied to:
/// balances in base units, or `1`/`0` for ERC-721 `ownerOf` checks.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    async fn observe(&self, query: &BalanceQuery) -> Result<U256, ChainClientError>;
}

/// Production oracle backed by per-chain alloy HTTP providers.
pub struct RpcBalanceOracle {
    registry: ChainRegistry,
    clients: RwLock<HashMap<String, Arc<ChainClient>>>,
    call_timeout: Duration,
}

impl RpcBalanceOracle {
    pub fn new(registry: ChainRegistry) -> Self {
        Self {
            registry,
            clients: RwLock::new(HashMap::new()),
            call_timeout: Duration::from_secs(LEAF_CALL_TIMEOUT_SECS),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Get or build the client for a chain.
    async fn client_for(&self, chain: &str) -> Result<Arc<ChainClient>, ChainClientError> {
        let key = chain.to_ascii_lowercase();

        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        let network = self
            .registry
            .get(&key)
            .ok_or_else(|| ChainClientError::UnknownChain(chain.to_string()))?
            .clone();

        let client = Arc::new(ChainClient::new(network)?);
        let mut clients = self.clients.write().await;
        let entry = clients.entry(key).or_insert_with(|| client.clone());
        Ok(entry.clone())
    }

    /// One RPC attempt, dispatched by asset standard.
    async fn query_once(
        &self,
        client: &ChainClient,
        query: &BalanceQuery,
    ) -> Result<U256, ChainClientError> {
        match query.standard {
            AssetStandard::Native => client.native_balance(query.wallet).await,
            AssetStandard::Erc20 => {
                let contract = require_contract(query)?;
                client.erc20_balance(contract, query.wallet).await
            }
            AssetStandard::Erc721 => {
                let contract = require_contract(query)?;
                match query.token_id {
                    // Specific token: ownership check, observed as 1 or 0.
                    Some(token_id) => {
                        let owner = client.erc721_owner_of(contract, token_id).await?;
                        Ok(if owner == query.wallet {
                            U256::from(1u8)
                        } else {
                            U256::ZERO
                        })
                    }
                    // Whole collection: how many the wallet holds.
                    None => client.erc721_balance(contract, query.wallet).await,
                }
            }
            AssetStandard::Erc1155 => {
                let contract = require_contract(query)?;
                let token_id = query.token_id.ok_or_else(|| {
                    ChainClientError::ContractError("ERC-1155 query requires token_id".to_string())
                })?;
                client.erc1155_balance(contract, query.wallet, token_id).await
            }
        }
    }
}

fn require_contract(query: &BalanceQuery) -> Result<Address, ChainClientError> {
    query.contract.ok_or_else(|| {
        ChainClientError::InvalidAddress(format!(
            "{:?} query requires a contract address",
            query.standard
        ))
    })
}

#[async_trait]
impl BalanceOracle for RpcBalanceOracle {
    async fn observe(&self, query: &BalanceQuery) -> Result<U256, ChainClientError> {
        let client = self.client_for(&query.chain).await?;

        // One retry with backoff; leaves that still fail are reported as
        // errored by the evaluator, never retried indefinitely.
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            }
            match tokio::time::timeout(self.call_timeout, self.query_once(&client, query)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(
                        chain = %query.chain,
                        attempt,
                        error = %e,
                        "oracle query failed"
                    );
                    last_err = Some(e);
                }
                Err(_) => {
                    tracing::warn!(chain = %query.chain, attempt, "oracle query timed out");
                    last_err = Some(ChainClientError::Timeout(self.call_timeout.as_secs()));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ChainClientError::RpcError("no attempts made".to_string())))
    }
}
