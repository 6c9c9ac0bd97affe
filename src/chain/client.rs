// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM chain client for single-condition balance and ownership queries.

use std::str::FromStr;

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    sol,
};

use super::ChainNetwork;

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

// Minimal read-only interfaces for the three token standards. Only the
// methods the evaluator dispatches to are declared.
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IERC721 {
        function balanceOf(address owner) external view returns (uint256);
        function ownerOf(uint256 tokenId) external view returns (address);
    }

    #[sol(rpc)]
    interface IERC1155 {
        function balanceOf(address account, uint256 id) external view returns (uint256);
    }
}

/// Client for one EVM network.
pub struct ChainClient {
    /// Network configuration
    network: ChainNetwork,
    /// Alloy HTTP provider
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a new client for the specified network.
    pub fn new(network: ChainNetwork) -> Result<Self, ChainClientError> {
        let url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self { network, provider })
    }

    /// Get the native balance for an address, in wei.
    pub async fn native_balance(&self, wallet: Address) -> Result<U256, ChainClientError> {
        self.provider
            .get_balance(wallet)
            .await
            .map_err(|e| ChainClientError::RpcError(e.to_string()))
    }

    /// Get the ERC-20 balance of `wallet` at `contract`, in base units.
    pub async fn erc20_balance(
        &self,
        contract: Address,
        wallet: Address,
    ) -> Result<U256, ChainClientError> {
        let token = IERC20::new(contract, self.provider.clone());
        token
            .balanceOf(wallet)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    /// Get how many tokens of an ERC-721 collection `wallet` holds.
    pub async fn erc721_balance(
        &self,
        contract: Address,
        wallet: Address,
    ) -> Result<U256, ChainClientError> {
        let collection = IERC721::new(contract, self.provider.clone());
        collection
            .balanceOf(wallet)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    /// Get the current owner of a specific ERC-721 token.
    ///
    /// Reverts (surfaces as `ContractError`) for nonexistent token ids; the
    /// evaluator folds that into a failed leaf.
    pub async fn erc721_owner_of(
        &self,
        contract: Address,
        token_id: U256,
    ) -> Result<Address, ChainClientError> {
        let collection = IERC721::new(contract, self.provider.clone());
        collection
            .ownerOf(token_id)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    /// Get the ERC-1155 balance of `wallet` for token `id`.
    pub async fn erc1155_balance(
        &self,
        contract: Address,
        wallet: Address,
        token_id: U256,
    ) -> Result<U256, ChainClientError> {
        let token = IERC1155::new(contract, self.provider.clone());
        token
            .balanceOf(wallet, token_id)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    /// Get the network configuration.
    pub fn network(&self) -> &ChainNetwork {
        &self.network
    }
}

/// Parse a hex address string, mapping failures to `InvalidAddress`.
pub fn parse_address(address: &str) -> Result<Address, ChainClientError> {
    Address::from_str(address).map_err(|e| ChainClientError::InvalidAddress(e.to_string()))
}

/// Errors that can occur during chain queries.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("RPC call timed out after {0}s")]
    Timeout(u64),
}
