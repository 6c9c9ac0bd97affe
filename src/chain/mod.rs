// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain registry and shared blockchain types.
//!
//! Leaf conditions name chains symbolically (`"ethereum"`, `"polygon"`, ...);
//! the registry maps those names to chain ids and RPC endpoints. Endpoints
//! can be overridden per chain with `RPC_URL_<CHAIN>` environment variables,
//! which is also how tests point the oracle at a local mock node.

pub mod client;
pub mod oracle;

pub use client::{ChainClient, ChainClientError};
pub use oracle::{BalanceOracle, BalanceQuery, RpcBalanceOracle};

use std::collections::HashMap;

/// A supported EVM network.
#[derive(Debug, Clone)]
pub struct ChainNetwork {
    /// Symbolic name used in condition leaves
    pub name: &'static str,
    /// EVM chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
}

/// Built-in networks with public RPC endpoints.
const DEFAULT_NETWORKS: &[(&str, u64, &str)] = &[
    ("ethereum", 1, "https://eth.llamarpc.com"),
    ("polygon", 137, "https://polygon-rpc.com"),
    ("optimism", 10, "https://mainnet.optimism.io"),
    ("arbitrum", 42161, "https://arb1.arbitrum.io/rpc"),
    ("avalanche", 43114, "https://api.avax.network/ext/bc/C/rpc"),
    ("fuji", 43113, "https://api.avax-test.network/ext/bc/C/rpc"),
];

/// Registry of chains the oracle can query.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    networks: HashMap<String, ChainNetwork>,
}

impl ChainRegistry {
    /// Build the registry from built-in defaults plus `RPC_URL_<CHAIN>`
    /// environment overrides.
    pub fn from_env() -> Self {
        let mut networks = HashMap::new();
        for (name, chain_id, default_url) in DEFAULT_NETWORKS {
            let env_key = format!("RPC_URL_{}", name.to_uppercase());
            let rpc_url = std::env::var(&env_key).unwrap_or_else(|_| default_url.to_string());
            networks.insert(
                name.to_string(),
                ChainNetwork {
                    name,
                    chain_id: *chain_id,
                    rpc_url,
                },
            );
        }
        Self { networks }
    }

    /// Look up a network by its symbolic name (case-insensitive).
    pub fn get(&self, chain: &str) -> Option<&ChainNetwork> {
        self.networks.get(&chain.to_ascii_lowercase())
    }

    /// Whether a chain name is known. Used by registry-side validation.
    pub fn is_known(&self, chain: &str) -> bool {
        self.get(chain).is_some()
    }

    /// Names of all registered chains.
    pub fn chain_names(&self) -> Vec<&str> {
        self.networks.values().map(|n| n.name).collect()
    }
}
